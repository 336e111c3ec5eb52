//! Statement and expression types for mldsl.
//!
//! Source is line-oriented: each line is recognized into one [`Statement`]
//! (see `statement.rs`). Only arithmetic right-hand sides are parsed further
//! into an [`Expr`] tree.

/// Where an imported file's content goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPlacement {
    /// `import path` — inline at the directive.
    Splice,
    /// `use path` — append after the importing file's own lines.
    Append,
}

/// Assignment destination: `[save] name [~] = ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignTarget {
    pub name: String,
    /// Saved variables survive server restarts (`var_save`/`arr_save`).
    pub persistent: bool,
}

impl AssignTarget {
    pub fn var_token(&self) -> String {
        if self.persistent {
            format!("var_save({})", self.name)
        } else {
            format!("var({})", self.name)
        }
    }

    pub fn array_token(&self) -> String {
        if self.persistent {
            format!("arr_save({})", self.name)
        } else {
            format!("arr({})", self.name)
        }
    }
}

/// Opener of an `if`-like block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `if <cmp-or-range-expr> {` — raw condition text.
    Compare(String),
    /// `iftext <target> == a or b {`
    Text(String),
    /// `ifexists(name) {`
    Exists(String),
    /// `if_player.name(args) {`, `if_game...`, `if_entity...`, `if_value...`
    Catalog {
        module: String,
        name: String,
        args: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Event {
        name: String,
    },
    Function {
        name: String,
        params: Vec<String>,
    },
    Loop {
        name: String,
        ticks: u32,
    },
    Import {
        path: String,
        placement: ImportPlacement,
    },
    /// `module.name(args)`
    Call {
        module: String,
        name: String,
        args: String,
    },
    /// `name(args)` — function call by name, or a call-like builtin.
    BareCall {
        name: String,
        args: String,
    },
    Assign {
        target: AssignTarget,
        value: String,
    },
    IfOpen(Condition),
    /// `select.<chain>(args)`, optionally opening a restoring block.
    SelectOpen {
        chain: String,
        args: String,
        block: bool,
    },
    Return {
        value: Option<String>,
    },
    Close,
}

impl Statement {
    /// Whether the statement opens a program unit.
    pub fn is_unit_header(&self) -> bool {
        matches!(
            self,
            Statement::Event { .. } | Statement::Function { .. } | Statement::Loop { .. }
        )
    }
}

// ── Arithmetic ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Variable name, possibly with `%placeholder%` parts.
    Name(String),
    /// Host placeholder such as `%var(x)%`, usable directly as a number.
    Placeholder(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }

    /// `+` and `*` chains flatten fully; `-` and `/` only along the left spine.
    pub fn is_associative(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Mul)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
}

impl Expr {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Number(_) | Expr::Name(_) | Expr::Placeholder(_))
    }

    /// Evaluate when the tree contains only numbers.
    pub fn constant_value(&self) -> Option<f64> {
        match self {
            Expr::Number(v) => Some(*v),
            Expr::Name(_) | Expr::Placeholder(_) => None,
            Expr::Unary { op, operand } => {
                let v = operand.constant_value()?;
                Some(match op {
                    UnaryOp::Plus => v,
                    UnaryOp::Neg => -v,
                })
            }
            Expr::Binary { op, left, right } => {
                let a = left.constant_value()?;
                let b = right.constant_value()?;
                let v = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                };
                v.is_finite().then_some(v)
            }
        }
    }
}
