//! Abstract syntax for the XPath/XQuery subset the compiler understands.
//!
//! The expression engine proper lives outside this crate; this closed
//! tagged-union is the interface it hands us. An exhaustive `match` over
//! [`Expr`] replaces visitor double-dispatch, so adding a node kind is a
//! compile error until every consumer handles it.

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal (e.g. `1603`, `3.14`).
    Number(f64),

    /// A string literal.
    Literal(String),

    /// A variable reference, without the leading `$`.
    Variable(String),

    /// A binary operation.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary negation.
    Negate(Box<Expr>),

    /// A function call; the name may be prefixed (e.g. `fn:count`).
    FunctionCall { name: String, args: Vec<Expr> },

    /// A location path. An absolute path with no steps is the bare `/`.
    Path { absolute: bool, steps: Vec<Step> },

    /// A primary expression filtered by predicates (e.g. `$seq[2]`).
    Filter {
        expr: Box<Expr>,
        predicates: Vec<Expr>,
    },

    /// A node-set union (`a | b`).
    Union(Box<Expr>, Box<Expr>),

    /// A FLWOR-style ordering wrapper around `input`.
    OrderBy {
        input: Box<Expr>,
        keys: Vec<SortKey>,
    },
}

/// One `order by` key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub key: Expr,
    pub descending: bool,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
        }
    }

    /// Mirror a comparison so `lit op path` reads as `path op lit`.
    pub fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            other => other,
        }
    }
}

/// A single step in a location path.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    pub fn new(axis: Axis, node_test: NodeTest) -> Self {
        Self {
            axis,
            node_test,
            predicates: Vec::new(),
        }
    }
}

/// A location path axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Self_,
    Attribute,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

impl Axis {
    /// Forward axes select along document order; only they contribute
    /// name constraints to a derived query.
    pub fn is_forward(self) -> bool {
        matches!(
            self,
            Self::Child
                | Self::Descendant
                | Self::DescendantOrSelf
                | Self::Self_
                | Self::Attribute
                | Self::FollowingSibling
                | Self::Following
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Descendant => "descendant",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::Self_ => "self",
            Self::Attribute => "attribute",
            Self::Parent => "parent",
            Self::Ancestor => "ancestor",
            Self::AncestorOrSelf => "ancestor-or-self",
            Self::FollowingSibling => "following-sibling",
            Self::PrecedingSibling => "preceding-sibling",
            Self::Following => "following",
            Self::Preceding => "preceding",
        }
    }
}

/// A node test within a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A name test, possibly prefixed (`tei:title`).
    Name(String),
    /// `*`
    Wildcard,
    /// `prefix:*`
    PrefixWildcard(String),
    /// `node()`
    Node,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()`, optionally with a target.
    ProcessingInstruction(Option<String>),
}

impl Expr {
    /// `//name`, the workhorse of tests and examples.
    pub fn descendant(name: impl Into<String>) -> Self {
        Self::Path {
            absolute: true,
            steps: vec![Step::new(Axis::Descendant, NodeTest::Name(name.into()))],
        }
    }

    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::FunctionCall {
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_axes() {
        assert!(Axis::Child.is_forward());
        assert!(Axis::Attribute.is_forward());
        assert!(!Axis::Parent.is_forward());
        assert!(!Axis::Preceding.is_forward());
    }

    #[test]
    fn test_flipped_comparisons() {
        assert_eq!(BinaryOp::Lt.flipped(), BinaryOp::Gt);
        assert_eq!(BinaryOp::Gte.flipped(), BinaryOp::Lte);
        assert_eq!(BinaryOp::Eq.flipped(), BinaryOp::Eq);
    }

    #[test]
    fn test_descendant_helper() {
        let expr = Expr::descendant("title");
        let Expr::Path { absolute, steps } = &expr else {
            panic!("expected path");
        };
        assert!(absolute);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].node_test, NodeTest::Name("title".to_string()));
    }
}
