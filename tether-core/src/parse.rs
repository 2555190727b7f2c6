use crate::Result;
use anyhow::Context;
use time::{Date, PrimitiveDateTime, Time, macros::format_description};

/// Parse the textual representation drivers use for temporal columns.
pub trait Parse {
    fn parse(value: impl AsRef<str>) -> Result<Self>
    where
        Self: Sized;
}

/// Render temporal values in the same textual form [`Parse`] accepts.
pub trait Format {
    fn format_text(&self) -> Result<String>;
}

impl Parse for Date {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        Date::parse(value.as_ref(), format_description!("[year]-[month]-[day]"))
            .with_context(|| format!("Cannot parse '{}' as time::Date", value.as_ref()))
    }
}

impl Parse for Time {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref();
        Time::parse(
            value,
            format_description!("[hour]:[minute]:[second].[subsecond]"),
        )
        .or(Time::parse(
            value,
            format_description!("[hour]:[minute]:[second]"),
        ))
        .or(Time::parse(value, format_description!("[hour]:[minute]")))
        .with_context(|| format!("Cannot parse '{}' as time::Time", value))
    }
}

impl Parse for PrimitiveDateTime {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref();
        PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        )
        .or(PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ))
        .or(PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        ))
        .or(PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ))
        .or(PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]"),
        ))
        .with_context(|| format!("Cannot parse '{}' as time::PrimitiveDateTime", value))
    }
}

impl Format for Date {
    fn format_text(&self) -> Result<String> {
        Ok(self.format(format_description!("[year]-[month]-[day]"))?)
    }
}

impl Format for Time {
    fn format_text(&self) -> Result<String> {
        Ok(if self.nanosecond() == 0 {
            self.format(format_description!("[hour]:[minute]:[second]"))?
        } else {
            self.format(format_description!("[hour]:[minute]:[second].[subsecond]"))?
        })
    }
}

impl Format for PrimitiveDateTime {
    fn format_text(&self) -> Result<String> {
        Ok(if self.nanosecond() == 0 {
            self.format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))?
        } else {
            self.format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"
            ))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Format, Parse};
    use time::{
        Date, PrimitiveDateTime, Time,
        macros::{date, datetime, time},
    };

    #[test]
    fn parse_and_format_agree() {
        let t = datetime!(1999-12-31 23:59:59.25);
        assert_eq!(t.format_text().unwrap(), "1999-12-31 23:59:59.25");
        assert_eq!(<PrimitiveDateTime as Parse>::parse(t.format_text().unwrap()).unwrap(), t);
        assert_eq!(
            <PrimitiveDateTime as Parse>::parse("1999-12-31T23:59:59").unwrap(),
            datetime!(1999-12-31 23:59:59)
        );
        assert_eq!(time!(07:05:00).format_text().unwrap(), "07:05:00");
        assert_eq!(<Time as Parse>::parse("07:05").unwrap(), time!(07:05));
        assert_eq!(<Date as Parse>::parse("2020-01-02").unwrap(), date!(2020 - 01 - 02));
        assert!(<Date as Parse>::parse("2020/01/02").is_err());
    }
}
