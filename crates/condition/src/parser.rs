use chrono::NaiveDateTime;

use crate::error::CondError;
use crate::expr::Expr;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a condition source string into an [`Expr`] tree (spec §4.3).
///
/// An empty (or all-whitespace) string is the empty condition: always true.
pub fn parse(source: &str) -> Result<Expr, CondError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Ok(Expr::Empty);
    }
    let chars: Vec<char> = trimmed.chars().collect();
    let mut cursor = Cursor { chars: &chars, pos: 0 };
    let expr = cursor.parse_expr()?;
    cursor.skip_ws();
    if cursor.pos != cursor.chars.len() {
        return Err(CondError::TrailingInput(cursor.remaining()));
    }
    Ok(expr)
}

struct Cursor<'a> {
    chars: &'a [char],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn remaining(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect_char(&mut self, expected: char, label: &'static str) -> Result<(), CondError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(CondError::UnexpectedToken {
                expected: label,
                found: c.to_string(),
                pos: self.pos,
            }),
            None => Err(CondError::UnexpectedEof),
        }
    }

    fn parse_ident(&mut self) -> Result<String, CondError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '-') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(CondError::UnexpectedEof);
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_string(&mut self) -> Result<String, CondError> {
        self.expect_char('"', "string literal")?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(CondError::UnexpectedEof),
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(escaped) => {
                            out.push(escaped);
                            self.pos += 1;
                        }
                        None => return Err(CondError::UnexpectedEof),
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(out)
    }

    fn parse_int(&mut self) -> Result<i64, CondError> {
        self.skip_ws();
        let start = self.pos;
        if matches!(self.peek(), Some('-')) {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let slice: String = self.chars[start..self.pos].iter().collect();
        slice.parse::<i64>().map_err(|_| CondError::BadInteger(slice))
    }

    fn parse_timestamp(&mut self) -> Result<NaiveDateTime, CondError> {
        let raw = self.parse_string()?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map_err(|_| CondError::BadTimestamp(raw))
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, CondError> {
        let mut parts = Vec::new();
        self.skip_ws();
        if matches!(self.peek(), Some(')')) {
            return Ok(parts);
        }
        loop {
            parts.push(self.parse_expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(')') => break,
                Some(c) => {
                    return Err(CondError::UnexpectedToken {
                        expected: "`,` or `)`",
                        found: c.to_string(),
                        pos: self.pos,
                    });
                }
                None => return Err(CondError::UnexpectedEof),
            }
        }
        Ok(parts)
    }

    fn parse_expr(&mut self) -> Result<Expr, CondError> {
        let ident = self.parse_ident()?;
        self.expect_char('(', "`(`")?;
        let expr = match ident.as_str() {
            "empty" => {
                self.expect_char(')', "`)`")?;
                return Ok(Expr::Empty);
            }
            "true" => {
                self.expect_char(')', "`)`")?;
                return Ok(Expr::True);
            }
            "false" => {
                self.expect_char(')', "`)`")?;
                return Ok(Expr::False);
            }
            "has-inviter" => {
                self.expect_char(')', "`)`")?;
                return Ok(Expr::HasInviter);
            }
            "match-user" => {
                let id = self.parse_string()?;
                self.expect_char(')', "`)`")?;
                return Ok(Expr::MatchUser(id));
            }
            "register-before" => {
                let ts = self.parse_timestamp()?;
                self.expect_char(')', "`)`")?;
                return Ok(Expr::RegisterBefore(ts));
            }
            "access-after" => {
                let ts = self.parse_timestamp()?;
                self.expect_char(')', "`)`")?;
                return Ok(Expr::AccessAfter(ts));
            }
            "github-star" => {
                let repo = self.parse_string()?;
                self.expect_char(')', "`)`")?;
                return Ok(Expr::GithubStar(repo));
            }
            "quota-le" => {
                let model = self.parse_string()?;
                self.expect_char(',', "`,`")?;
                let n = self.parse_int()?;
                self.expect_char(')', "`)`")?;
                return Ok(Expr::QuotaLe(model, n));
            }
            "is-vip" => {
                let level = self.parse_int()?;
                self.expect_char(')', "`)`")?;
                let level = u32::try_from(level).map_err(|_| CondError::BadInteger(level.to_string()))?;
                return Ok(Expr::IsVip(level));
            }
            "belong-to" => {
                let org = self.parse_string()?;
                self.expect_char(')', "`)`")?;
                return Ok(Expr::BelongTo(org));
            }
            "and" => {
                let parts = self.parse_arg_list()?;
                self.expect_char(')', "`)`")?;
                return Ok(Expr::And(parts));
            }
            "or" => {
                let parts = self.parse_arg_list()?;
                self.expect_char(')', "`)`")?;
                return Ok(Expr::Or(parts));
            }
            "not" => {
                let mut parts = self.parse_arg_list()?;
                self.expect_char(')', "`)`")?;
                if parts.len() != 1 {
                    return Err(CondError::UnexpectedToken {
                        expected: "exactly one argument to not()",
                        found: parts.len().to_string(),
                        pos: self.pos,
                    });
                }
                return Ok(Expr::Not(Box::new(parts.remove(0))));
            }
            other => return Err(CondError::UnknownPredicate(other.to_owned())),
        };
        #[allow(unreachable_code)]
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_always_true() {
        assert_eq!(parse("").unwrap(), Expr::Empty);
        assert_eq!(parse("   ").unwrap(), Expr::Empty);
        assert_eq!(parse("(empty)").unwrap(), Expr::Empty);
    }

    #[test]
    fn parses_match_user() {
        assert_eq!(parse(r#"match-user("u-1")"#).unwrap(), Expr::MatchUser("u-1".into()));
    }

    #[test]
    fn parses_quota_le() {
        assert_eq!(
            parse(r#"quota-le("gpt-4", 100)"#).unwrap(),
            Expr::QuotaLe("gpt-4".into(), 100)
        );
    }

    #[test]
    fn parses_is_vip() {
        assert_eq!(parse("is-vip(3)").unwrap(), Expr::IsVip(3));
    }

    #[test]
    fn parses_nested_and_or_not() {
        let parsed = parse(r#"and(is-vip(2), not(github-star("acme/repo")))"#).unwrap();
        assert_eq!(
            parsed,
            Expr::And(vec![
                Expr::IsVip(2),
                Expr::Not(Box::new(Expr::GithubStar("acme/repo".into())))
            ])
        );
    }

    #[test]
    fn parses_timestamp_predicates() {
        let parsed = parse(r#"register-before("2024-01-01 00:00:00")"#).unwrap();
        assert!(matches!(parsed, Expr::RegisterBefore(_)));
    }

    #[test]
    fn rejects_unknown_predicate() {
        assert!(matches!(parse("bogus()"), Err(CondError::UnknownPredicate(_))));
    }

    #[test]
    fn rejects_trailing_input() {
        assert!(matches!(parse("true() true()"), Err(CondError::TrailingInput(_))));
    }

    #[test]
    fn rejects_not_with_wrong_arity() {
        assert!(parse("not(true(), false())").is_err());
    }
}
