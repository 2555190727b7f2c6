use crate::{Error, Result};
use convert_case::{Case, Casing};
use std::ffi::CString;

pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Same as [`separated_by`] for writers that can fail.
pub fn try_separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) -> Result<()>
where
    F: FnMut(&mut String, T) -> Result<()>,
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v)?;
    }
    Ok(())
}

/// Lower snake case, used for table and column names.
pub fn snake_case(name: &str) -> String {
    name.to_case(Case::Snake)
}

pub fn pascal_case(name: &str) -> String {
    name.to_case(Case::Pascal)
}

pub fn as_c_string<S: Into<Vec<u8>>>(str: S) -> Result<CString> {
    CString::new(str.into()).map_err(|e| Error::new(e).context("Expected a valid C string"))
}

#[macro_export]
macro_rules! possibly_parenthesized {
    ($buff:ident, $cond:expr, $v:expr) => {
        if $cond {
            $buff.push('(');
            $v;
            $buff.push(')');
        } else {
            $v;
        }
    };
}

/// Longest prefix of `value` within `max` bytes ending on a character boundary.
pub fn truncated(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            $crate::truncated(&$query, 497).trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}

#[cfg(test)]
mod tests {
    use super::{pascal_case, separated_by, snake_case, truncated};

    #[test]
    fn naming() {
        assert_eq!(snake_case("PurchaseOrder"), "purchase_order");
        assert_eq!(snake_case("firstName"), "first_name");
        assert_eq!(snake_case("id"), "id");
        assert_eq!(pascal_case("id"), "Id");
        assert_eq!(pascal_case("order_number"), "OrderNumber");
    }

    #[test]
    fn separated() {
        let mut out = String::from("(");
        separated_by(&mut out, [1, 2, 3], |o, v| o.push_str(&v.to_string()), ", ");
        out.push(')');
        assert_eq!(out, "(1, 2, 3)");
    }

    #[test]
    fn truncation_respects_characters() {
        let text = "é".repeat(300);
        assert_eq!(truncated(&text, 497).len(), 496);
        assert!(truncated(&text, 497).ends_with('é'));
        assert_eq!(truncated("short", 497), "short");
        let printed = format!("{}", truncate_long!(text));
        assert!(printed.ends_with("é..."));
    }
}
