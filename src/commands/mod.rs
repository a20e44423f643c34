pub mod account;
pub mod changes;
pub mod events;
pub mod status;

use anyhow::{Result, anyhow};
use calmirror_core::date_range::DateRange;
use calmirror_core::projection::{QueryParams, SortField, SortOrder};

/// Build query parameters from the shared `--from/--to/--sort/--desc/--limit` flags.
pub fn query_params(
    from: Option<&str>,
    to: Option<&str>,
    sort: Option<&str>,
    descending: bool,
    limit: Option<usize>,
) -> Result<QueryParams> {
    let range = DateRange::from_args(from, to).map_err(|e| anyhow!(e))?;

    let field = match sort {
        Some(name) => Some(name.parse::<SortField>().map_err(|e| anyhow!(e))?),
        None => None,
    };
    let order = match (field, descending) {
        (Some(field), descending) => Some(SortOrder { field, descending }),
        (None, true) => Some(SortOrder::descending(SortField::Start)),
        (None, false) => None,
    };

    Ok(QueryParams {
        range,
        order,
        limit,
        include_alarms: false,
    })
}
