use winnow::prelude::*;
use winnow::ascii::{Caseless, digit1, multispace1, till_line_ending};
use winnow::combinator::{alt, delimited, not, opt, preceded, repeat, separated, terminated};
use winnow::error::{ContextError, ParserError};
use winnow::token::{any, one_of, take_till, take_until, take_while};

use crate::error::GenError;
use crate::schema_ast::*;

const TABLE_CONSTRAINT_WORDS: &[&str] = &[
    "primary",
    "unique",
    "key",
    "index",
    "constraint",
    "foreign",
    "fulltext",
    "spatial",
    "check",
];

/// Parse every `CREATE TABLE` statement in a DDL script. Other statements
/// (`DROP`, `SET`, `INSERT`, ...) and comments are skipped.
pub fn parse_schemas(input: &str) -> Result<Vec<TableSchema>, GenError> {
    let mut remaining = input;
    ddl_script(&mut remaining).map_err(|_| syntax_error(input, remaining))
}

pub fn parse_schema(input: &str) -> Result<TableSchema, GenError> {
    let mut tables = parse_schemas(input)?;
    if tables.len() != 1 {
        let context = if tables.is_empty() {
            "no CREATE TABLE statement".to_string()
        } else {
            format!("{} CREATE TABLE statements", tables.len())
        };
        return Err(GenError::Syntax { line: 1, context });
    }
    Ok(tables.remove(0))
}

fn syntax_error(input: &str, remaining: &str) -> GenError {
    let offset = input.len() - remaining.len();
    let line = input[..offset].matches('\n').count() + 1;
    let context = remaining.lines().next().unwrap_or("").trim();
    let context_display = if context.chars().count() > 40 {
        format!("{}...", context.chars().take(40).collect::<String>())
    } else {
        context.to_string()
    };
    GenError::Syntax {
        line,
        context: context_display,
    }
}

fn ddl_script(input: &mut &str) -> winnow::Result<Vec<TableSchema>> {
    let mut tables = Vec::new();
    loop {
        ws.parse_next(input)?;
        if input.is_empty() {
            return Ok(tables);
        }

        let checkpoint = *input;
        if create_table_keywords.parse_next(input).is_ok() {
            tables.push(create_table_body.parse_next(input)?);
        } else {
            *input = checkpoint;
            skip_statement.parse_next(input)?;
        }
    }
}

fn ws(input: &mut &str) -> winnow::Result<()> {
    repeat(0.., alt((multispace1.void(), line_comment, block_comment))).parse_next(input)
}

fn ws1(input: &mut &str) -> winnow::Result<()> {
    multispace1.void().parse_next(input)?;
    ws.parse_next(input)
}

fn line_comment(input: &mut &str) -> winnow::Result<()> {
    (alt(("--", "#")), till_line_ending).void().parse_next(input)
}

fn block_comment(input: &mut &str) -> winnow::Result<()> {
    ("/*", take_until(0.., "*/"), "*/").void().parse_next(input)
}

fn keyword<'s>(word: &'static str) -> impl Parser<&'s str, &'s str, ContextError> {
    terminated(
        Caseless(word),
        not(one_of(|c: char| c.is_ascii_alphanumeric() || c == '_')),
    )
}

fn create_table_keywords(input: &mut &str) -> winnow::Result<()> {
    keyword("create").parse_next(input)?;
    ws1.parse_next(input)?;
    opt((keyword("temporary"), ws1)).parse_next(input)?;
    keyword("table").parse_next(input)?;
    ws1.parse_next(input)?;
    opt((
        keyword("if"),
        ws1,
        keyword("not"),
        ws1,
        keyword("exists"),
        ws1,
    ))
    .parse_next(input)?;
    Ok(())
}

fn create_table_body(input: &mut &str) -> winnow::Result<TableSchema> {
    let name = qualified_identifier.parse_next(input)?;
    ws.parse_next(input)?;
    '('.parse_next(input)?;

    let mut columns: Vec<ColumnDefinition> = Vec::new();
    let mut primary_key: Vec<String> = Vec::new();
    loop {
        ws.parse_next(input)?;
        if starts_table_constraint(input) {
            let start = *input;
            skip_definition.parse_next(input)?;
            let text = &start[..start.len() - input.len()];
            primary_key.extend(primary_key_columns(text));
        } else {
            columns.push(column_definition.parse_next(input)?);
        }
        ws.parse_next(input)?;
        match any.parse_next(input)? {
            ',' => continue,
            ')' => break,
            _ => return Err(ParserError::from_input(input)),
        }
    }
    skip_statement.parse_next(input)?;

    for column in columns.iter_mut() {
        if primary_key.contains(&column.name) {
            column.nullable = false;
        }
    }

    Ok(TableSchema { name, columns })
}

fn starts_table_constraint(input: &str) -> bool {
    let word: String = input
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    TABLE_CONSTRAINT_WORDS
        .iter()
        .any(|w| word.eq_ignore_ascii_case(w))
}

fn primary_key_columns(definition: &str) -> Vec<String> {
    let lower = definition.to_ascii_lowercase();
    if !lower.starts_with("primary") && !lower.starts_with("constraint") {
        return Vec::new();
    }
    if !lower.contains("primary key") {
        return Vec::new();
    }
    let (Some(open), Some(close)) = (definition.find('('), definition.rfind(')')) else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    definition[open + 1..close]
        .split(',')
        .map(|part| {
            let part = part.trim();
            let part = part.split('(').next().unwrap_or(part);
            part.trim().trim_matches('`').to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Debug)]
enum ColumnAttribute {
    NotNull,
    Null,
    Default(ColumnDefault),
    AutoIncrement,
    PrimaryKey,
    Comment(String),
    Other,
}

fn column_definition(input: &mut &str) -> winnow::Result<ColumnDefinition> {
    let name = identifier.parse_next(input)?;
    ws1.parse_next(input)?;
    let sql_type = column_type.parse_next(input)?;

    let mut column = ColumnDefinition::new(name, sql_type);
    let mut not_null = false;
    let mut primary = false;
    loop {
        ws.parse_next(input)?;
        if input.is_empty() || input.starts_with([',', ')']) {
            break;
        }
        match column_attribute.parse_next(input)? {
            ColumnAttribute::NotNull => not_null = true,
            ColumnAttribute::Null => not_null = false,
            ColumnAttribute::Default(default) => column.default = default,
            ColumnAttribute::AutoIncrement => column.auto_increment = true,
            ColumnAttribute::PrimaryKey => primary = true,
            ColumnAttribute::Comment(text) => column.comment = Some(text),
            ColumnAttribute::Other => {}
        }
    }
    column.nullable = !not_null && !primary;

    Ok(column)
}

fn column_attribute(input: &mut &str) -> winnow::Result<ColumnAttribute> {
    alt((
        (keyword("not"), ws1, keyword("null")).map(|_| ColumnAttribute::NotNull),
        keyword("null").map(|_| ColumnAttribute::Null),
        preceded((keyword("default"), ws1), default_value).map(ColumnAttribute::Default),
        keyword("auto_increment").map(|_| ColumnAttribute::AutoIncrement),
        (keyword("primary"), ws1, keyword("key")).map(|_| ColumnAttribute::PrimaryKey),
        preceded((keyword("comment"), ws, opt('='), ws), quoted('\'', true))
            .map(ColumnAttribute::Comment),
        other_token.map(|_| ColumnAttribute::Other),
    ))
    .parse_next(input)
}

fn default_value(input: &mut &str) -> winnow::Result<ColumnDefault> {
    alt((
        keyword("null").map(|_| ColumnDefault::Null),
        (
            alt((
                keyword("current_timestamp"),
                keyword("localtimestamp"),
                keyword("now"),
            )),
            opt(delimited('(', digit1, ')')),
        )
            .map(|_| ColumnDefault::CurrentTimestamp),
        quoted('\'', true).map(ColumnDefault::Literal),
        take_while(1.., |c: char| {
            c.is_ascii_digit() || c == '.' || c == '-' || c == '+'
        })
        .map(|s: &str| ColumnDefault::Literal(s.to_string())),
    ))
    .parse_next(input)
}

fn other_token(input: &mut &str) -> winnow::Result<()> {
    alt((
        take_while(1.., |c: char| {
            c.is_alphanumeric() || c == '_' || c == '.' || c == '='
        })
        .void(),
        balanced_parens,
        quoted('\'', true).void(),
        quoted('"', false).void(),
        quoted('`', false).void(),
    ))
    .parse_next(input)
}

#[derive(Debug)]
enum TypeArg {
    Number(u32),
    Text(String),
}

fn column_type(input: &mut &str) -> winnow::Result<SqlType> {
    let start = *input;
    let name: &str =
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)?;
    let args = opt(preceded(ws, type_args)).parse_next(input)?;
    let modifiers: Vec<&str> = repeat(
        0..,
        preceded(
            ws,
            alt((keyword("unsigned"), keyword("signed"), keyword("zerofill"))),
        ),
    )
    .parse_next(input)?;
    let raw = start[..start.len() - input.len()].trim();

    let unsigned = modifiers
        .iter()
        .any(|m| m.eq_ignore_ascii_case("unsigned") || m.eq_ignore_ascii_case("zerofill"));
    Ok(resolve_type(name, args.as_deref(), unsigned, raw))
}

fn type_args(input: &mut &str) -> winnow::Result<Vec<TypeArg>> {
    delimited(
        ('(', ws),
        separated(0.., terminated(type_arg, ws), (',', ws)),
        ')',
    )
    .parse_next(input)
}

fn type_arg(input: &mut &str) -> winnow::Result<TypeArg> {
    alt((
        digit1.try_map(str::parse::<u32>).map(TypeArg::Number),
        quoted('\'', true).map(TypeArg::Text),
    ))
    .parse_next(input)
}

fn resolve_type(name: &str, args: Option<&[TypeArg]>, unsigned: bool, raw: &str) -> SqlType {
    let unrecognized = || SqlType::Unrecognized(raw.to_string());
    match (name.to_ascii_lowercase().as_str(), args) {
        ("bigint", _) => SqlType::Integer {
            width: IntWidth::Big,
            unsigned,
        },
        ("int" | "integer", _) => SqlType::Integer {
            width: IntWidth::Int,
            unsigned,
        },
        ("mediumint", _) => SqlType::Integer {
            width: IntWidth::Medium,
            unsigned,
        },
        ("smallint", _) => SqlType::SmallInt {
            width: SmallWidth::Small,
            unsigned,
        },
        ("tinyint", _) => SqlType::SmallInt {
            width: SmallWidth::Tiny,
            unsigned,
        },
        ("char", None) => SqlType::Char(1),
        ("char", Some([TypeArg::Number(n)])) => SqlType::Char(*n),
        ("varchar", Some([TypeArg::Number(n)])) => SqlType::VarChar(*n),
        ("date", None) => SqlType::Date,
        ("timestamp" | "datetime", None) => SqlType::Timestamp { fsp: 0 },
        ("timestamp" | "datetime", Some([TypeArg::Number(p)])) if *p <= 6 => {
            SqlType::Timestamp { fsp: *p as u8 }
        }
        ("decimal" | "numeric", None) => SqlType::Decimal {
            precision: 10,
            scale: 0,
        },
        ("decimal" | "numeric", Some([TypeArg::Number(m)])) => SqlType::Decimal {
            precision: *m,
            scale: 0,
        },
        ("decimal" | "numeric", Some([TypeArg::Number(m), TypeArg::Number(d)])) => {
            SqlType::Decimal {
                precision: *m,
                scale: *d,
            }
        }
        ("enum", Some(values)) if !values.is_empty() => {
            let mut variants = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    TypeArg::Text(text) => variants.push(text.clone()),
                    TypeArg::Number(_) => return unrecognized(),
                }
            }
            SqlType::Enum(variants)
        }
        _ => unrecognized(),
    }
}

fn qualified_identifier(input: &mut &str) -> winnow::Result<String> {
    let first = identifier.parse_next(input)?;
    let second = opt(preceded('.', identifier)).parse_next(input)?;
    Ok(second.unwrap_or(first))
}

fn identifier(input: &mut &str) -> winnow::Result<String> {
    alt((
        quoted('`', false),
        quoted('"', false),
        take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '$')
            .map(|s: &str| s.to_string()),
    ))
    .parse_next(input)
}

/// Quoted text where a doubled quote stands for itself. Backslash escapes are
/// honoured only for string literals.
fn quoted(mut quote: char, backslash_escapes: bool) -> impl FnMut(&mut &str) -> winnow::Result<String> {
    move |input: &mut &str| {
        quote.parse_next(input)?;
        let mut text = String::new();
        loop {
            let chunk: &str = if backslash_escapes {
                take_till(0.., [quote, '\\']).parse_next(input)?
            } else {
                take_till(0.., [quote]).parse_next(input)?
            };
            text.push_str(chunk);
            let c: char = any.parse_next(input)?;
            if c == '\\' {
                let escaped: char = any.parse_next(input)?;
                text.push(escaped);
            } else if input.starts_with(quote) {
                let doubled: char = any.parse_next(input)?;
                text.push(doubled);
            } else {
                return Ok(text);
            }
        }
    }
}

fn balanced_parens(input: &mut &str) -> winnow::Result<()> {
    '('.parse_next(input)?;
    let mut depth = 0usize;
    loop {
        let _: &str = take_till(0.., ['(', ')', '\'', '"', '`']).parse_next(input)?;
        match input.chars().next() {
            None => return Err(ParserError::from_input(input)),
            Some('(') => {
                depth += 1;
                any.void().parse_next(input)?;
            }
            Some(')') => {
                any.void().parse_next(input)?;
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Some('\'') => {
                quoted('\'', true).void().parse_next(input)?;
            }
            Some(q) => {
                quoted(q, false).void().parse_next(input)?;
            }
        }
    }
}

/// Skip a table-level definition (key, constraint, index) up to the `,` or
/// `)` that ends it, leaving that delimiter in place.
fn skip_definition(input: &mut &str) -> winnow::Result<()> {
    loop {
        let _: &str = take_till(0.., ['(', ')', ',', '\'', '"', '`']).parse_next(input)?;
        match input.chars().next() {
            None => return Err(ParserError::from_input(input)),
            Some(')' | ',') => return Ok(()),
            Some('(') => balanced_parens.parse_next(input)?,
            Some('\'') => {
                quoted('\'', true).void().parse_next(input)?;
            }
            Some(q) => {
                quoted(q, false).void().parse_next(input)?;
            }
        }
    }
}

fn skip_statement(input: &mut &str) -> winnow::Result<()> {
    loop {
        let _: &str = take_till(0.., [';', '\'', '"', '`']).parse_next(input)?;
        match input.chars().next() {
            None => return Ok(()),
            Some(';') => {
                any.void().parse_next(input)?;
                return Ok(());
            }
            Some('\'') => {
                quoted('\'', true).void().parse_next(input)?;
            }
            Some(q) => {
                quoted(q, false).void().parse_next(input)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADJUST_REASON: &str = "\
CREATE TABLE `adjust_reason` (
  `id` bigint unsigned NOT NULL AUTO_INCREMENT,
  `uuid` char(26) NOT NULL,
  `adjust_reason` varchar(25) NOT NULL,
  `created_timestamp` timestamp(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
  PRIMARY KEY (`id`),
  UNIQUE KEY `uk_adjust_reason_uuid` (`uuid`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
";

    #[test]
    fn parse_identifier_backticked() {
        let mut input = "`fee_code` rest";
        assert_eq!(identifier(&mut input).unwrap(), "fee_code");
        assert_eq!(input, " rest");
    }

    #[test]
    fn parse_identifier_bare() {
        let mut input = "fee_code rest";
        assert_eq!(identifier(&mut input).unwrap(), "fee_code");
    }

    #[test]
    fn parse_string_literal_escapes() {
        let mut input = "'it''s \\'fine\\'' rest";
        let text = quoted('\'', true)(&mut input).unwrap();
        assert_eq!(text, "it's 'fine'");
        assert_eq!(input, " rest");
    }

    #[test]
    fn parse_quoted_identifier_with_doubled_backtick() {
        let mut input = "`odd``name`, next";
        let text = quoted('`', false)(&mut input).unwrap();
        assert_eq!(text, "odd`name");
        assert_eq!(input, ", next");
    }

    #[test]
    fn parse_column_type_bigint_unsigned() {
        let mut input = "bigint unsigned NOT NULL";
        let ty = column_type(&mut input).unwrap();
        assert_eq!(
            ty,
            SqlType::Integer {
                width: IntWidth::Big,
                unsigned: true
            }
        );
        assert_eq!(input, " NOT NULL");
    }

    #[test]
    fn parse_column_type_decimal() {
        let mut input = "decimal(12, 3) DEFAULT NULL";
        let ty = column_type(&mut input).unwrap();
        assert_eq!(
            ty,
            SqlType::Decimal {
                precision: 12,
                scale: 3
            }
        );
    }

    #[test]
    fn parse_column_type_enum() {
        let mut input = "enum('SETUP','ACTIVE','DEPRECATED','DELETED') NOT NULL";
        let ty = column_type(&mut input).unwrap();
        assert_eq!(
            ty,
            SqlType::Enum(vec![
                "SETUP".into(),
                "ACTIVE".into(),
                "DEPRECATED".into(),
                "DELETED".into()
            ])
        );
    }

    #[test]
    fn parse_column_type_unrecognized_keeps_spelling() {
        let mut input = "json NOT NULL";
        let ty = column_type(&mut input).unwrap();
        assert_eq!(ty, SqlType::Unrecognized("json".into()));
    }

    #[test]
    fn parse_column_nullable_by_default() {
        let mut input = "`full_desc` varchar(255) DEFAULT NULL,";
        let col = column_definition(&mut input).unwrap();
        assert!(col.nullable);
        assert_eq!(col.default, ColumnDefault::Null);
        assert_eq!(input, ",");
    }

    #[test]
    fn parse_column_literal_default_and_comment() {
        let mut input = "`sort_order` smallint NOT NULL DEFAULT '10' COMMENT 'display order')";
        let col = column_definition(&mut input).unwrap();
        assert!(!col.nullable);
        assert_eq!(col.default, ColumnDefault::Literal("10".into()));
        assert_eq!(col.comment.as_deref(), Some("display order"));
    }

    #[test]
    fn parse_column_on_update_is_skipped() {
        let mut input = "`modified_timestamp` timestamp(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6) ON UPDATE CURRENT_TIMESTAMP(6),";
        let col = column_definition(&mut input).unwrap();
        assert_eq!(col.default, ColumnDefault::CurrentTimestamp);
        assert_eq!(col.sql_type, SqlType::Timestamp { fsp: 6 });
    }

    #[test]
    fn parse_adjust_reason_table() {
        let schema = parse_schema(ADJUST_REASON).unwrap();
        assert_eq!(schema.name, "adjust_reason");
        let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "uuid", "adjust_reason", "created_timestamp"]);
        let id = schema.column("id").unwrap();
        assert!(id.auto_increment);
        assert!(!id.nullable);
    }

    #[test]
    fn parse_script_skips_other_statements_and_comments() {
        let input = format!(
            "-- billing schema\n/*!40101 SET NAMES utf8 */;\nDROP TABLE IF EXISTS `adjust_reason`;\n{ADJUST_REASON}\n# trailing\nINSERT INTO t VALUES ('a;b');\n"
        );
        let tables = parse_schemas(&input).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "adjust_reason");
    }

    #[test]
    fn parse_table_level_primary_key_forces_not_null() {
        let input = "CREATE TABLE t (\n  code varchar(10),\n  PRIMARY KEY (`code`)\n);";
        let schema = parse_schema(input).unwrap();
        assert!(!schema.columns[0].nullable);
    }

    #[test]
    fn parse_two_tables_in_order() {
        let input = "create table a (x int);\ncreate table if not exists b (y date);";
        let tables = parse_schemas(input).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn parse_error_reports_line() {
        let input = "CREATE TABLE t (\n  a int,\n  b varchar(\n);";
        let err = parse_schemas(input).unwrap_err();
        match err {
            GenError::Syntax { line, .. } => assert!(line >= 3, "line was {line}"),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn parse_schema_requires_exactly_one_table() {
        assert!(parse_schema("SET NAMES utf8;").is_err());
    }
}
