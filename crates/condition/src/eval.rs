use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::context::EvalContext;
use crate::error::CondError;
use crate::expr::Expr;

fn localize(naive: chrono::NaiveDateTime, ctx: &EvalContext<'_>) -> Result<DateTime<Utc>, CondError> {
    naive
        .and_local_timezone(ctx.server_tz)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| CondError::BadTimestamp(naive.to_string()))
}

/// Evaluate a parsed condition against a user and evaluation context (spec
/// §4.3). `and`/`or` short-circuit; `quota-le` is the only predicate that
/// performs I/O (a lazy gateway lookup).
pub fn eval<'a>(
    expr: &'a Expr,
    ctx: &'a EvalContext<'a>,
) -> Pin<Box<dyn Future<Output = Result<bool, CondError>> + Send + 'a>> {
    Box::pin(async move {
        match expr {
            Expr::Empty | Expr::True => Ok(true),
            Expr::False => Ok(false),
            Expr::MatchUser(id) => Ok(&ctx.user.id == id),
            Expr::RegisterBefore(ts) => Ok(ctx.user.created_at < localize(*ts, ctx)?),
            Expr::AccessAfter(ts) => Ok(ctx.user.last_access_at >= localize(*ts, ctx)?),
            Expr::GithubStar(repo) => Ok(ctx.user.has_star(repo)),
            Expr::QuotaLe(model, n) => {
                let used = ctx.quota.total_quota(&ctx.user.id, model).await?;
                Ok(used <= *n)
            }
            Expr::IsVip(level) => Ok(ctx.user.vip_level >= *level),
            Expr::BelongTo(org) => Ok(&ctx.user.org == org),
            Expr::HasInviter => Ok(ctx.user.has_inviter()),
            Expr::And(parts) => {
                for part in parts {
                    if !eval(part, ctx).await? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Or(parts) => {
                for part in parts {
                    if eval(part, ctx).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Not(inner) => Ok(!eval(inner, ctx).await?),
        }
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use qm_core::User;
    use std::collections::BTreeSet;

    use super::*;
    use crate::context::QuotaLookup;
    use crate::parser::parse;

    struct StaticQuota(i64);

    #[async_trait]
    impl QuotaLookup for StaticQuota {
        async fn total_quota(&self, _user_id: &str, _model: &str) -> Result<i64, CondError> {
            Ok(self.0)
        }
    }

    fn sample_user() -> User {
        User {
            id: "u-1".into(),
            name: "Ada".into(),
            phone: "555".into(),
            github_login: "ada".into(),
            github_stars: BTreeSet::from(["acme/repo".to_owned()]),
            vip_level: 2,
            org: "acme".into(),
            created_at: Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
            last_access_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            inviter_id: None,
        }
    }

    #[tokio::test]
    async fn empty_condition_always_true() {
        let user = sample_user();
        let quota = StaticQuota(0);
        let ctx = EvalContext::new(&user, Utc::now(), chrono_tz::UTC, &quota);
        assert!(eval(&Expr::Empty, &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn match_user_and_is_vip() {
        let user = sample_user();
        let quota = StaticQuota(0);
        let ctx = EvalContext::new(&user, Utc::now(), chrono_tz::UTC, &quota);
        let expr = parse(r#"and(match-user("u-1"), is-vip(2))"#).unwrap();
        assert!(eval(&expr, &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn quota_le_uses_gateway_lookup() {
        let user = sample_user();
        let quota = StaticQuota(50);
        let ctx = EvalContext::new(&user, Utc::now(), chrono_tz::UTC, &quota);
        let expr = parse(r#"quota-le("gpt-4", 100)"#).unwrap();
        assert!(eval(&expr, &ctx).await.unwrap());

        let quota = StaticQuota(150);
        let ctx = EvalContext::new(&user, Utc::now(), chrono_tz::UTC, &quota);
        assert!(!eval(&expr, &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn or_short_circuits_true() {
        let user = sample_user();
        let quota = StaticQuota(0);
        let ctx = EvalContext::new(&user, Utc::now(), chrono_tz::UTC, &quota);
        let expr = parse(r#"or(belong-to("acme"), match-user("nonexistent"))"#).unwrap();
        assert!(eval(&expr, &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn not_negates() {
        let user = sample_user();
        let quota = StaticQuota(0);
        let ctx = EvalContext::new(&user, Utc::now(), chrono_tz::UTC, &quota);
        let expr = parse(r#"not(github-star("other/repo"))"#).unwrap();
        assert!(eval(&expr, &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn register_before_compares_against_localized_timestamp() {
        let user = sample_user();
        let quota = StaticQuota(0);
        let ctx = EvalContext::new(&user, Utc::now(), chrono_tz::UTC, &quota);
        let expr = parse(r#"register-before("2024-01-01 00:00:00")"#).unwrap();
        assert!(eval(&expr, &ctx).await.unwrap());
    }
}
