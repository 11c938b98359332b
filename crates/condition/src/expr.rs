use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The condition-language AST (spec §4.3).
///
/// Unlike the open expression language a general rule engine might expose,
/// this grammar is closed: exactly the eleven predicates/combinators in
/// spec §4.3's table, nothing else. The tagged-enum + recursive evaluator
/// shape is still the idiom, just over a much smaller surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// `(empty)` or an empty source string: always true.
    Empty,
    /// `true()`.
    True,
    /// `false()`.
    False,
    /// `match-user(id)`.
    MatchUser(String),
    /// `register-before(ts)`; `ts` is parsed but not yet anchored to a
    /// timezone — evaluation combines it with the evaluator's configured
    /// server timezone.
    RegisterBefore(NaiveDateTime),
    /// `access-after(ts)`.
    AccessAfter(NaiveDateTime),
    /// `github-star(repo)`.
    GithubStar(String),
    /// `quota-le(model, n)`.
    QuotaLe(String, i64),
    /// `is-vip(level)`.
    IsVip(u32),
    /// `belong-to(org)`.
    BelongTo(String),
    /// `has-inviter()`.
    HasInviter,
    /// `and(c1, c2, ...)`.
    And(Vec<Expr>),
    /// `or(c1, c2, ...)`.
    Or(Vec<Expr>),
    /// `not(c)`.
    Not(Box<Expr>),
}

impl Expr {
    /// Returns `true` if this expression tree contains a `has-inviter()`
    /// node anywhere, which signals the invitation-style dispatch
    /// redirection in spec §4.4 point 6.
    #[must_use]
    pub fn mentions_has_inviter(&self) -> bool {
        match self {
            Self::HasInviter => true,
            Self::Not(inner) => inner.mentions_has_inviter(),
            Self::And(parts) | Self::Or(parts) => {
                parts.iter().any(Self::mentions_has_inviter)
            }
            _ => false,
        }
    }

    /// Render a human-readable pseudo-source form, mirroring the teacher's
    /// `Expr::to_source` for audit-log readability.
    #[must_use]
    pub fn to_source(&self) -> String {
        match self {
            Self::Empty => "(empty)".to_owned(),
            Self::True => "true()".to_owned(),
            Self::False => "false()".to_owned(),
            Self::MatchUser(id) => format!("match-user(\"{id}\")"),
            Self::RegisterBefore(ts) => format!("register-before(\"{ts}\")"),
            Self::AccessAfter(ts) => format!("access-after(\"{ts}\")"),
            Self::GithubStar(repo) => format!("github-star(\"{repo}\")"),
            Self::QuotaLe(model, n) => format!("quota-le(\"{model}\", {n})"),
            Self::IsVip(level) => format!("is-vip({level})"),
            Self::BelongTo(org) => format!("belong-to(\"{org}\")"),
            Self::HasInviter => "has-inviter()".to_owned(),
            Self::And(parts) => {
                let inner = parts.iter().map(Self::to_source).collect::<Vec<_>>().join(", ");
                format!("and({inner})")
            }
            Self::Or(parts) => {
                let inner = parts.iter().map(Self::to_source).collect::<Vec<_>>().join(", ");
                format!("or({inner})")
            }
            Self::Not(inner) => format!("not({})", inner.to_source()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_has_inviter_direct() {
        assert!(Expr::HasInviter.mentions_has_inviter());
        assert!(!Expr::True.mentions_has_inviter());
    }

    #[test]
    fn mentions_has_inviter_nested() {
        let expr = Expr::And(vec![Expr::True, Expr::Not(Box::new(Expr::HasInviter))]);
        assert!(expr.mentions_has_inviter());
    }

    #[test]
    fn mentions_has_inviter_absent_in_or() {
        let expr = Expr::Or(vec![Expr::True, Expr::False]);
        assert!(!expr.mentions_has_inviter());
    }

    #[test]
    fn to_source_roundtrip_shape() {
        let expr = Expr::And(vec![Expr::IsVip(2), Expr::BelongTo("acme".into())]);
        assert_eq!(expr.to_source(), "and(is-vip(2), belong-to(\"acme\"))");
    }
}
