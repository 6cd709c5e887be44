//! Policy trees, canonical strings, and attribute lists
//!
//! A policy is a monotone access structure: leaves are opaque canonical
//! attribute strings, interior nodes are thresholds (`AND` is `t = n`, `OR`
//! is `t = 1`). The type in this module is always **normalized**: children
//! are sorted by their canonical rendering, single-child thresholds are
//! collapsed, and threshold bounds are validated.
//!
//! ## Canonical form
//!
//! Exactly one canonical string exists per logical policy:
//!
//! - a leaf renders as its literal;
//! - `(c₁ and … and cₙ)` when `t = n`, `(c₁ or … or cₙ)` when `t = 1`;
//! - `(t of {c₁, c₂, …, cₙ})` for general thresholds;
//! - children are sorted lexicographically by their canonical renderings
//!   before printing.
//!
//! Logically equal policies therefore produce identical canonical bytes,
//! which is what every nonce-binding hash in the crate consumes. The
//! canonical order also drives leaf numbering ([`LeafId`]), LSSS traversal,
//! and the ciphertext component enumeration, so nothing in the system ever
//! depends on hash-map iteration order.
//!
//! ## Reader
//!
//! [`Policy::parse`] reads the canonical grammar back into a tree (the wire
//! format carries only the canonical string). It accepts any well-formed
//! infix input, not just sorted renderings, and normalization makes the
//! result canonical; mixed `and`/`or` at one level must be parenthesized.
//!
//! Typed attributes (`name:value`, `name<21`) are opaque single tokens here;
//! matching is exact string equality against the attribute list.

#![forbid(unsafe_code)]

use std::fmt;

/// Stable identifier of a policy leaf: its 1-based preorder position in the
/// normalized tree. Ciphertext labels (`C_3`, `D_3`) and LSSS maps key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafId(pub u32);

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from policy construction, parsing, or attribute validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("threshold {t} out of range for {n} children")]
    BadThreshold { t: usize, n: usize },
    #[error("threshold node has no children")]
    NoChildren,
    #[error("empty attribute")]
    EmptyAttribute,
    #[error("attribute `{0}` contains an invalid character")]
    BadAttribute(String),
    #[error("attribute `{0}` appears more than once")]
    DuplicateAttribute(String),
    #[error("unexpected end of policy input")]
    UnexpectedEnd,
    #[error("unexpected token `{0}` in policy input")]
    UnexpectedToken(String),
    #[error("mixed `and`/`or` at one level; parenthesize to disambiguate")]
    MixedConnectives,
    #[error("trailing input after policy")]
    TrailingInput,
}

/// A node of the (normalized) access tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyNode {
    /// Attribute literal.
    Leaf(String),
    /// Satisfied when at least `t` of `children` are satisfied.
    Threshold { t: usize, children: Vec<PolicyNode> },
}

/// A normalized monotone policy with its cached canonical rendering.
#[derive(Debug, Clone)]
pub struct Policy {
    root: PolicyNode,
    canonical: String,
}

impl PartialEq for Policy {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}
impl Eq for Policy {}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl Policy {
    /// Normalize a raw tree into a policy.
    pub fn from_node(node: PolicyNode) -> Result<Self, PolicyError> {
        let root = normalize(node)?;
        let canonical = render(&root);
        Ok(Self { root, canonical })
    }

    /// Single-attribute policy.
    pub fn leaf(attr: &str) -> Result<Self, PolicyError> {
        Self::from_node(PolicyNode::Leaf(attr.to_string()))
    }

    /// `AND` of the given subtrees.
    pub fn and(children: Vec<PolicyNode>) -> Result<Self, PolicyError> {
        let n = children.len();
        Self::from_node(PolicyNode::Threshold { t: n, children })
    }

    /// `OR` of the given subtrees.
    pub fn or(children: Vec<PolicyNode>) -> Result<Self, PolicyError> {
        Self::from_node(PolicyNode::Threshold { t: 1, children })
    }

    /// General `t`-of-`n` threshold.
    pub fn threshold(t: usize, children: Vec<PolicyNode>) -> Result<Self, PolicyError> {
        Self::from_node(PolicyNode::Threshold { t, children })
    }

    /// Read a policy from its infix textual form.
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        let tokens = tokenize(text)?;
        let mut p = Parser { tokens, pos: 0 };
        let node = p.expr()?;
        if p.pos != p.tokens.len() {
            return Err(PolicyError::TrailingInput);
        }
        Self::from_node(node)
    }

    /// The canonical UTF-8 rendering; the exact bytes every binding hash
    /// consumes.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// The normalized root node.
    pub fn root(&self) -> &PolicyNode {
        &self.root
    }

    /// Whether `attrs` satisfies this policy.
    pub fn satisfies(&self, attrs: &AttributeList) -> bool {
        satisfied(&self.root, attrs)
    }

    /// Leaves in canonical traversal order with their stable ids (1-based
    /// preorder).
    pub fn leaves(&self) -> Vec<(LeafId, String)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &mut out);
        out
    }
}

fn normalize(node: PolicyNode) -> Result<PolicyNode, PolicyError> {
    match node {
        PolicyNode::Leaf(attr) => {
            validate_attribute(&attr)?;
            Ok(PolicyNode::Leaf(attr))
        }
        PolicyNode::Threshold { t, children } => {
            let n = children.len();
            if n == 0 {
                return Err(PolicyError::NoChildren);
            }
            if t == 0 || t > n {
                return Err(PolicyError::BadThreshold { t, n });
            }
            let mut kids = children
                .into_iter()
                .map(normalize)
                .collect::<Result<Vec<_>, _>>()?;
            if kids.len() == 1 {
                // 1-of-1 collapses to the child
                return Ok(kids.remove(0));
            }
            kids.sort_by(|a, b| render(a).cmp(&render(b)));
            Ok(PolicyNode::Threshold { t, children: kids })
        }
    }
}

fn render(node: &PolicyNode) -> String {
    match node {
        PolicyNode::Leaf(attr) => attr.clone(),
        PolicyNode::Threshold { t, children } => {
            let parts: Vec<String> = children.iter().map(render).collect();
            if *t == children.len() {
                format!("({})", parts.join(" and "))
            } else if *t == 1 {
                format!("({})", parts.join(" or "))
            } else {
                format!("({} of {{{}}})", t, parts.join(", "))
            }
        }
    }
}

fn satisfied(node: &PolicyNode, attrs: &AttributeList) -> bool {
    match node {
        PolicyNode::Leaf(attr) => attrs.contains(attr),
        PolicyNode::Threshold { t, children } => {
            children.iter().filter(|c| satisfied(c, attrs)).count() >= *t
        }
    }
}

fn collect_leaves(node: &PolicyNode, out: &mut Vec<(LeafId, String)>) {
    match node {
        PolicyNode::Leaf(attr) => {
            let id = LeafId(out.len() as u32 + 1);
            out.push((id, attr.clone()));
        }
        PolicyNode::Threshold { children, .. } => {
            for c in children {
                collect_leaves(c, out);
            }
        }
    }
}

fn is_attr_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '<' | '>' | '=' | '@' | '#' | '|' | '-' | '+' | '/')
}

fn validate_attribute(attr: &str) -> Result<(), PolicyError> {
    if attr.is_empty() {
        return Err(PolicyError::EmptyAttribute);
    }
    if !attr.chars().all(is_attr_char)
        || attr.chars().all(|c| c.is_ascii_digit())
        || matches!(attr, "and" | "or" | "of")
    {
        return Err(PolicyError::BadAttribute(attr.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reader for the infix grammar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    And,
    Or,
    Of,
    Int(usize),
    Atom(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::Comma => f.write_str(","),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Of => f.write_str("of"),
            Token::Int(n) => write!(f, "{}", n),
            Token::Atom(a) => f.write_str(a),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, PolicyError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            c if is_attr_char(c) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if is_attr_char(c) {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "of" => Token::Of,
                    _ if word.chars().all(|c| c.is_ascii_digit()) => {
                        Token::Int(word.parse().map_err(|_| PolicyError::BadAttribute(word.clone()))?)
                    }
                    _ => Token::Atom(word),
                });
            }
            other => return Err(PolicyError::UnexpectedToken(other.to_string())),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, PolicyError> {
        let t = self.tokens.get(self.pos).cloned().ok_or(PolicyError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, want: Token) -> Result<(), PolicyError> {
        let got = self.next()?;
        if got == want {
            Ok(())
        } else {
            Err(PolicyError::UnexpectedToken(got.to_string()))
        }
    }

    /// `expr := term ((and|or) term)*`, homogeneous connective per level.
    fn expr(&mut self) -> Result<PolicyNode, PolicyError> {
        let first = self.term()?;
        let connective = match self.peek() {
            Some(Token::And) => Token::And,
            Some(Token::Or) => Token::Or,
            _ => return Ok(first),
        };
        let mut children = vec![first];
        while let Some(t) = self.peek() {
            match t {
                Token::And | Token::Or => {
                    let t = t.clone();
                    if t != connective {
                        return Err(PolicyError::MixedConnectives);
                    }
                    self.pos += 1;
                    children.push(self.term()?);
                }
                _ => break,
            }
        }
        let n = children.len();
        let t = if connective == Token::And { n } else { 1 };
        Ok(PolicyNode::Threshold { t, children })
    }

    /// `term := '(' expr ')' | INT of '{' expr (',' expr)* '}' | ATTR`
    fn term(&mut self) -> Result<PolicyNode, PolicyError> {
        match self.next()? {
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Int(t) => {
                self.expect(Token::Of)?;
                self.expect(Token::LBrace)?;
                let mut children = vec![self.expr()?];
                loop {
                    match self.next()? {
                        Token::Comma => children.push(self.expr()?),
                        Token::RBrace => break,
                        other => return Err(PolicyError::UnexpectedToken(other.to_string())),
                    }
                }
                Ok(PolicyNode::Threshold { t, children })
            }
            Token::Atom(attr) => Ok(PolicyNode::Leaf(attr)),
            other => Err(PolicyError::UnexpectedToken(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute lists
// ---------------------------------------------------------------------------

/// A canonically sorted set of attribute strings. Duplicates are rejected at
/// construction; iteration order is the sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeList {
    attrs: Vec<String>,
}

impl AttributeList {
    /// Build from owned strings, validating and sorting.
    pub fn new<I, S>(attrs: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut attrs: Vec<String> = attrs.into_iter().map(Into::into).collect();
        for a in &attrs {
            validate_attribute(a)?;
        }
        attrs.sort();
        for w in attrs.windows(2) {
            if w[0] == w[1] {
                return Err(PolicyError::DuplicateAttribute(w[0].clone()));
            }
        }
        Ok(Self { attrs })
    }

    /// Read back a newline-joined canonical list (the `attrs` wire entry).
    pub fn from_joined(joined: &str) -> Result<Self, PolicyError> {
        if joined.is_empty() {
            return Ok(Self { attrs: Vec::new() });
        }
        Self::new(joined.split('\n').map(str::to_string))
    }

    /// Exact membership test.
    pub fn contains(&self, attr: &str) -> bool {
        self.attrs.binary_search_by(|a| a.as_str().cmp(attr)).is_ok()
    }

    /// Attributes in canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Newline-joined canonical form: the `attrs` container entry and the
    /// KP-side CCA binding string.
    pub fn joined(&self) -> String {
        self.attrs.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pol(s: &str) -> Policy {
        Policy::parse(s).expect("parse")
    }

    #[test]
    fn commutative_and_canonicalizes_identically() {
        assert_eq!(pol("(a and b)").canonical(), "(a and b)");
        assert_eq!(pol("(b and a)").canonical(), "(a and b)");
        assert_eq!(pol("(a and b)"), pol("(b and a)"));
    }

    #[test]
    fn nested_policies_round_trip_through_canonical_form() {
        for src in [
            "((a and b) or c)",
            "(a or b or c)",
            "(2 of {a, b, c})",
            "role:admin",
            "((x and y) or (2 of {p, q, r}))",
        ] {
            let p = pol(src);
            let again = pol(p.canonical());
            assert_eq!(p, again);
            assert_eq!(p.canonical(), again.canonical());
        }
    }

    #[test]
    fn unparenthesized_input_canonicalizes_with_sorted_children() {
        let p = pol("c and a and b");
        assert_eq!(p.canonical(), "(a and b and c)");
    }

    #[test]
    fn parenthesized_child_sorts_before_plain_leaf() {
        // '(' orders before any attribute character
        assert_eq!(pol("c or (a and b)").canonical(), "((a and b) or c)");
    }

    #[test]
    fn single_child_threshold_collapses() {
        let p = Policy::threshold(1, vec![PolicyNode::Leaf("a".into())]).unwrap();
        assert_eq!(p.canonical(), "a");
    }

    #[test]
    fn mixed_connectives_require_parentheses() {
        assert_eq!(Policy::parse("a and b or c"), Err(PolicyError::MixedConnectives));
        assert!(Policy::parse("(a and b) or c").is_ok());
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        assert!(Policy::parse("").is_err());
        assert!(Policy::parse("(a and b").is_err());
        assert!(Policy::parse("a b").is_err());
        assert!(Policy::parse("4 of {a, b, c}").is_err()); // t > n
        assert!(Policy::parse("0 of {a, b}").is_err());
        assert!(Policy::parse("a and and b").is_err());
        assert!(Policy::parse("(a and b))").is_err());
    }

    #[test]
    fn satisfaction_follows_thresholds() {
        let p = pol("((a and b) or c)");
        let ab = AttributeList::new(["a", "b"]).unwrap();
        let c = AttributeList::new(["c"]).unwrap();
        let a = AttributeList::new(["a"]).unwrap();
        assert!(p.satisfies(&ab));
        assert!(p.satisfies(&c));
        assert!(!p.satisfies(&a));

        let t = pol("(2 of {x, y, z})");
        assert!(t.satisfies(&AttributeList::new(["x", "z"]).unwrap()));
        assert!(!t.satisfies(&AttributeList::new(["y"]).unwrap()));
    }

    #[test]
    fn leaves_are_numbered_in_canonical_preorder() {
        let p = pol("(c or (a and b))");
        // canonical: ((a and b) or c)
        let leaves = p.leaves();
        let names: Vec<&str> = leaves.iter().map(|(_, a)| a.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let ids: Vec<u32> = leaves.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn attribute_lists_sort_and_reject_duplicates() {
        let l = AttributeList::new(["b", "a", "c"]).unwrap();
        assert_eq!(l.joined(), "a\nb\nc");
        assert!(l.contains("b"));
        assert!(!l.contains("d"));
        assert_eq!(
            AttributeList::new(["a", "a"]),
            Err(PolicyError::DuplicateAttribute("a".into()))
        );
        assert_eq!(AttributeList::from_joined("a\nb\nc").unwrap(), l);
    }

    #[test]
    fn typed_attributes_are_opaque_tokens() {
        let p = pol("(role:admin and age<21)");
        assert_eq!(p.canonical(), "(age<21 and role:admin)");
        let l = AttributeList::new(["age<21", "role:admin"]).unwrap();
        assert!(p.satisfies(&l));
    }

    #[test]
    fn invalid_attributes_are_rejected() {
        assert!(AttributeList::new([""]).is_err());
        assert!(AttributeList::new(["has space"]).is_err());
        assert!(AttributeList::new(["123"]).is_err());
        assert!(AttributeList::new(["and"]).is_err());
    }
}
