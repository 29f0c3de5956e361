//! Show how a delete request would be split.

use anyhow::{bail, Context, Result};
use topicsync_core::{plan_deletion, DeletionPlan, DeletionRange};
use topicsync_types::Seq;

/// Parse a range argument.
///
/// Accepted forms use raw signed ids (negative for provisional ones):
/// `low:hi` (half-open), `low:` (to the end), `all`.
pub fn parse_range(arg: &str) -> Result<DeletionRange> {
    let arg = arg.trim();
    if arg.eq_ignore_ascii_case("all") {
        return Ok(DeletionRange::All);
    }

    let Some((low, hi)) = arg.split_once(':') else {
        bail!("range '{}' must look like low:hi, low: or all", arg);
    };
    let low = parse_seq(low).with_context(|| format!("bad low bound in '{}'", arg))?;

    if hi.trim().is_empty() {
        return Ok(DeletionRange::open(low));
    }
    let hi = parse_seq(hi).with_context(|| format!("bad high bound in '{}'", arg))?;
    DeletionRange::bounded(low, hi).with_context(|| format!("range '{}' is empty", arg))
}

fn parse_seq(raw: &str) -> Result<Seq> {
    let value: i64 = raw.trim().parse()?;
    Ok(Seq::from_raw(value)?)
}

/// Plan `ranges` against `max_seq` and render the result.
pub fn render(ranges: &[DeletionRange], max_seq: u64) -> Result<Vec<String>> {
    let plan = plan_deletion(ranges, max_seq)?;
    Ok(describe(&plan))
}

fn describe(plan: &DeletionPlan) -> Vec<String> {
    let mut lines = Vec::new();
    if plan.is_empty() {
        lines.push("nothing to delete".to_string());
        return lines;
    }

    if plan.needs_server() {
        lines.push(format!("server request ({} ranges):", plan.remote.len()));
        for range in &plan.remote {
            lines.push(format!("  [{}, {})", range.low, range.hi));
        }
    } else {
        lines.push("no server request".to_string());
    }

    if !plan.local.is_empty() {
        lines.push(format!("local only ({} ranges):", plan.local.len()));
        for range in &plan.local {
            lines.push(format!("  [{}, {})", range.low(), range.hi()));
        }
    }
    lines
}

/// Run the plan command.
pub fn run(range_args: &[String], max_seq: u64) -> Result<()> {
    let ranges = range_args
        .iter()
        .map(|arg| parse_range(arg))
        .collect::<Result<Vec<_>>>()?;

    println!("=== delete plan (max seq {}) ===", max_seq);
    for line in render(&ranges, max_seq)? {
        println!("{}", line);
    }
    Ok(())
}
