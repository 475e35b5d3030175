//! MySQL / MariaDB SQL dialect implementation

use super::SqlDialect;
use crate::domain::meta_query::CastType;

/// MySQL SQL dialect
pub struct MysqlDialect;

impl SqlDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_literal(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\x1a' => out.push_str("\\Z"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    fn like_escape_suffix(&self) -> &'static str {
        ""
    }

    fn json_extract(&self, doc: &str, path: &str) -> String {
        format!("JSON_EXTRACT({}, {})", doc, path)
    }

    fn json_extract_unquoted(&self, doc: &str, path: &str) -> String {
        format!("JSON_UNQUOTE(JSON_EXTRACT({}, {}))", doc, path)
    }

    fn json_contains_path(&self, doc: &str, path: &str) -> String {
        format!("JSON_CONTAINS_PATH({}, 'one', {})", doc, path)
    }

    fn cast(&self, expr: &str, cast: CastType) -> String {
        format!("CAST({} AS {})", expr, cast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_literal_plain() {
        assert_eq!(MysqlDialect.quote_literal("red"), "'red'");
    }

    #[test]
    fn test_quote_literal_escapes() {
        let dialect = MysqlDialect;
        assert_eq!(dialect.quote_literal("it's"), r"'it\'s'");
        assert_eq!(dialect.quote_literal(r"a\b"), r"'a\\b'");
        assert_eq!(dialect.quote_literal("say \"hi\""), r#"'say \"hi\"'"#);
        assert_eq!(dialect.quote_literal("line\nbreak"), r"'line\nbreak'");
        assert_eq!(dialect.quote_literal("nul\0"), r"'nul\0'");
    }

    #[test]
    fn test_quote_literal_injection() {
        assert_eq!(
            MysqlDialect.quote_literal("'); DROP TABLE x; --"),
            r"'\'); DROP TABLE x; --'"
        );
    }

    #[test]
    fn test_json_functions() {
        let dialect = MysqlDialect;
        assert_eq!(
            dialect.json_extract_unquoted("m.json", "'$.color'"),
            "JSON_UNQUOTE(JSON_EXTRACT(m.json, '$.color'))"
        );
        assert_eq!(
            dialect.json_contains_path("m.json", "'$.color'"),
            "JSON_CONTAINS_PATH(m.json, 'one', '$.color')"
        );
        assert_eq!(
            dialect.json_extract("m.json", "'$.color'"),
            "JSON_EXTRACT(m.json, '$.color')"
        );
    }

    #[test]
    fn test_cast() {
        assert_eq!(
            MysqlDialect.cast("x", CastType::Decimal(Some((10, Some(2))))),
            "CAST(x AS DECIMAL(10,2))"
        );
        assert_eq!(MysqlDialect.cast("x", CastType::Signed), "CAST(x AS SIGNED)");
    }
}
