//! Realtime request keys
//!
//! Realtime data is requested per race with a `YYYYMMDDJJRR` key (date, place code, race number).

use super::types::SourceRequest;
use chrono::NaiveDate;

/// Data specs polled when none are configured (odds, race details, changes)
pub const DEFAULT_DATA_SPECS: &[&str] = &["0B14", "0B12", "0B15", "0B11", "0B01"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeKeys {
    date: NaiveDate,
    places: u8,
    races: u8,
}

impl RealtimeKeys {
    /// Keys for `date`, place codes `1..=places`, races `1..=races`
    pub fn for_date(date: NaiveDate, places: u8, races: u8) -> Self {
        Self {
            date,
            places,
            races,
        }
    }

    pub fn len(&self) -> usize {
        usize::from(self.places) * usize::from(self.races)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        let day = self.date.format("%Y%m%d").to_string();
        (1..=self.places).flat_map(move |place| {
            let day = day.clone();
            (1..=self.races).map(move |race| format!("{}{:02}{:02}", day, place, race))
        })
    }

    /// Every key crossed with every data spec
    pub fn requests(&self, specs: &[String]) -> Vec<SourceRequest> {
        specs
            .iter()
            .flat_map(|spec| self.iter().map(move |key| SourceRequest::new(spec.clone(), key)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_key_format_and_order() {
        let keys: Vec<_> = RealtimeKeys::for_date(june_15(), 2, 3).iter().collect();
        assert_eq!(
            keys,
            vec![
                "202406150101",
                "202406150102",
                "202406150103",
                "202406150201",
                "202406150202",
                "202406150203",
            ]
        );
    }

    #[test]
    fn test_full_day_count() {
        let keys = RealtimeKeys::for_date(june_15(), 59, 12);
        assert_eq!(keys.len(), 708);
        assert_eq!(keys.iter().count(), 708);
        assert_eq!(keys.iter().last().as_deref(), Some("202406155912"));
    }

    #[test]
    fn test_requests_cross_specs() {
        let keys = RealtimeKeys::for_date(june_15(), 1, 2);
        let requests = keys.requests(&["0B14".to_string(), "0B12".to_string()]);
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0], SourceRequest::new("0B14", "202406150101"));
        assert_eq!(requests[3], SourceRequest::new("0B12", "202406150102"));
    }

    #[test]
    fn test_zero_places_is_empty() {
        assert!(RealtimeKeys::for_date(june_15(), 0, 12).is_empty());
    }
}
