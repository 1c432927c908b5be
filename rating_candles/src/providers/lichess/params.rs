use crate::models::request_params::GamesRequestParams;

/// Query string for the user games export.
///
/// `sort=dateDesc` is always sent: the service defaults to it today, but the
/// day aggregator is only correct for newest-first delivery, so it is pinned.
pub fn construct_params(params: &GamesRequestParams) -> Vec<(String, String)> {
    let mut query = vec![
        ("perfType".to_string(), params.perf_type.to_string()),
        ("rated".to_string(), params.rated.to_string()),
        ("moves".to_string(), "false".to_string()),
        ("sort".to_string(), "dateDesc".to_string()),
    ];
    if let Some(max) = params.max {
        query.push(("max".to_string(), max.to_string()));
    }
    if let Some(since) = params.since {
        query.push(("since".to_string(), since.timestamp_millis().to_string()));
    }
    query
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::perf_type::PerfType;

    fn lookup<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
        query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn minimal_request_pins_order_and_category() {
        let query = construct_params(&GamesRequestParams::new("german11", PerfType::Bullet));
        assert_eq!(lookup(&query, "perfType"), Some("bullet"));
        assert_eq!(lookup(&query, "rated"), Some("true"));
        assert_eq!(lookup(&query, "moves"), Some("false"));
        assert_eq!(lookup(&query, "sort"), Some("dateDesc"));
        assert_eq!(lookup(&query, "max"), None);
        assert_eq!(lookup(&query, "since"), None);
    }

    #[test]
    fn optional_bounds_are_forwarded() {
        let mut params = GamesRequestParams::new("german11", PerfType::KingOfTheHill);
        params.max = Some(200);
        params.since = Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());

        let query = construct_params(&params);
        assert_eq!(lookup(&query, "perfType"), Some("kingOfTheHill"));
        assert_eq!(lookup(&query, "max"), Some("200"));
        assert_eq!(lookup(&query, "since"), Some("1704153600000"));
    }
}
