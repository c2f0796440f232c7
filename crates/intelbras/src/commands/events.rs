//! Access record log query.

use chrono::{DateTime, Duration, Utc};
use tabled::Tabled;

use intelbras_core::{CoreError, Device, EventLogParser, EventRecord, FieldValue};

use crate::cli::{EventsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "RecNo")]
    rec_no: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Door")]
    door: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Type")]
    kind: String,
}

impl EventRow {
    fn new(r: &EventRecord) -> Self {
        let field = |name: &str| r.get(name).map(FieldValue::to_string).unwrap_or_default();
        Self {
            rec_no: field("RecNo"),
            time: r
                .created_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| field("CreateTime")),
            door: field("Door"),
            method: field("Method"),
            user: field("UserID"),
            kind: field("Type"),
        }
    }
}

pub async fn handle(device: &Device, args: EventsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let now = Utc::now();
    let since = parse_time(&args.since, now, "--since")?;
    let until = parse_time(&args.until, now, "--until")?;
    if since > until {
        return Err(CliError::Validation {
            field: "--since".into(),
            reason: format!("window start {since} is after end {until}"),
        });
    }

    let raw = device
        .client()
        .events_raw(since, until)
        .await
        .map_err(CoreError::from)?;
    let records = EventLogParser::new(args.strict)
        .parse_bytes(&raw)
        .map_err(CoreError::from)?;
    tracing::debug!(since, until, count = records.len(), "fetched access records");

    let out = output::render_list(global.output, &records, EventRow::new)?;
    output::print_output(&out);
    Ok(())
}

/// Accept epoch seconds, RFC 3339, `now`, or a relative age such as `90s`,
/// `30m`, `2h`, `1d`.
fn parse_time(input: &str, now: DateTime<Utc>, field: &str) -> Result<i64, CliError> {
    let input = input.trim();
    let invalid = || CliError::Validation {
        field: field.into(),
        reason: format!(
            "'{input}' is not epoch seconds, RFC 3339, 'now', or a relative age like 30m"
        ),
    };

    if input.eq_ignore_ascii_case("now") {
        return Ok(now.timestamp());
    }
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        return input.parse().map_err(|_| invalid());
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(input) {
        return Ok(t.timestamp());
    }

    let split = input.len().saturating_sub(1);
    let (amount, unit) = input.split_at_checked(split).ok_or_else(invalid)?;
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    let age = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => None,
    }
    .filter(|d| *d >= Duration::zero())
    .ok_or_else(invalid)?;
    Ok((now - age).timestamp())
}
