use super::error::CompileError;

/// Tokens of an arithmetic right-hand side. Anything the expression
/// compiler does not support still lexes, so the parser can name it.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Name(String),
    /// `%var(x)%`
    Placeholder(String),
    Str(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power, // ** or ^
    LParen,
    RParen,
    Comma,
    Other(char),
}

impl Token {
    /// Operators that mark a right-hand side as arithmetic.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::Percent | Token::Power
        )
    }

    pub fn describe(&self) -> String {
        match self {
            Token::Number(v) => format!("number `{v}`"),
            Token::Name(n) => format!("name `{n}`"),
            Token::Placeholder(p) => format!("placeholder `{p}`"),
            Token::Str(s) => format!("text literal \"{s}\""),
            Token::Plus => "`+`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Percent => "`%`".to_string(),
            Token::Power => "power operator".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Other(c) => format!("`{c}`"),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '%'
}

pub fn lex(source: &str) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(&ch) = chars.get(pos) {
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        match ch {
            '+' => { pos += 1; tokens.push(Token::Plus); }
            '-' => { pos += 1; tokens.push(Token::Minus); }
            '/' => { pos += 1; tokens.push(Token::Slash); }
            '^' => { pos += 1; tokens.push(Token::Power); }
            '(' => { pos += 1; tokens.push(Token::LParen); }
            ')' => { pos += 1; tokens.push(Token::RParen); }
            ',' => { pos += 1; tokens.push(Token::Comma); }
            '*' => {
                pos += 1;
                if chars.get(pos) == Some(&'*') {
                    pos += 1;
                    tokens.push(Token::Power);
                } else {
                    tokens.push(Token::Star);
                }
            }
            '"' | '\'' => {
                pos += 1;
                let mut text = String::new();
                loop {
                    match chars.get(pos) {
                        Some(&c) if c == ch => {
                            pos += 1;
                            break;
                        }
                        Some(&c) => {
                            text.push(c);
                            pos += 1;
                        }
                        None => {
                            return Err(CompileError::syntax(format!(
                                "unterminated text literal in `{source}`"
                            )))
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            '%' => {
                if let Some(end) = placeholder_end(&chars, pos) {
                    pos = end;
                    tokens.push(Token::Placeholder(chars[start..end].iter().collect()));
                } else if chars.get(pos + 1).is_some_and(|c| is_name_char(*c)) {
                    pos = scan_name(&chars, pos);
                    tokens.push(Token::Name(chars[start..pos].iter().collect()));
                } else {
                    pos += 1;
                    tokens.push(Token::Percent);
                }
            }
            c if c.is_ascii_digit() => {
                while chars.get(pos).is_some_and(char::is_ascii_digit) {
                    pos += 1;
                }
                if chars.get(pos) == Some(&'.') && chars.get(pos + 1).is_some_and(char::is_ascii_digit) {
                    pos += 1;
                    while chars.get(pos).is_some_and(char::is_ascii_digit) {
                        pos += 1;
                    }
                }
                let text: String = chars[start..pos].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| CompileError::syntax(format!("invalid number `{text}`")))?;
                tokens.push(Token::Number(value));
            }
            c if is_name_char(c) => {
                pos = scan_name(&chars, pos);
                tokens.push(Token::Name(chars[start..pos].iter().collect()));
            }
            other => {
                pos += 1;
                tokens.push(Token::Other(other));
            }
        }
    }

    Ok(tokens)
}

fn scan_name(chars: &[char], mut pos: usize) -> usize {
    while chars.get(pos).is_some_and(|c| is_name_char(*c)) {
        pos += 1;
    }
    pos
}

/// `%word(...)%` spans, returning the index past the closing `%`.
fn placeholder_end(chars: &[char], start: usize) -> Option<usize> {
    let mut pos = start + 1;
    let word_start = pos;
    while chars.get(pos).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
        pos += 1;
    }
    if pos == word_start || chars.get(pos) != Some(&'(') {
        return None;
    }
    while let Some(&c) = chars.get(pos) {
        pos += 1;
        if c == ')' {
            return (chars.get(pos) == Some(&'%')).then_some(pos + 1);
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lexes_arithmetic() {
        let tokens = lex("a + 2.5*(b - 1)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("a".into()),
                Token::Plus,
                Token::Number(2.5),
                Token::Star,
                Token::LParen,
                Token::Name("b".into()),
                Token::Minus,
                Token::Number(1.0),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn percent_names_and_placeholders() {
        let tokens = lex("%selected%counter + %var(x)%").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("%selected%counter".into()),
                Token::Plus,
                Token::Placeholder("%var(x)%".into()),
            ]
        );
    }

    #[test]
    fn standalone_percent_is_an_operator() {
        let tokens = lex("a % 2").unwrap();
        assert_eq!(tokens[1], Token::Percent);
    }

    #[test]
    fn power_forms() {
        assert_eq!(lex("a ** 2").unwrap()[1], Token::Power);
        assert_eq!(lex("a^2").unwrap()[1], Token::Power);
    }

    #[test]
    fn cyrillic_names() {
        assert_eq!(lex("счёт").unwrap(), vec![Token::Name("счёт".into())]);
    }

    #[test]
    fn unterminated_text_is_an_error() {
        assert!(lex("\"abc").is_err());
    }
}
