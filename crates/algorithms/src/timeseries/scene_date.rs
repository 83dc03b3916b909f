//! Acquisition dates from scene identities

use chrono::NaiveDate;

use vegtrend_core::{Error, Result};

/// Parse the acquisition date from a scene identity.
///
/// The date is the first run of exactly eight ASCII digits that forms a
/// valid `YYYYMMDD` calendar date. Longer digit runs are not split.
///
/// ```ignore
/// let date = parse_scene_date("S2B_30STF_20250314_0_L2A")?;
/// assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
/// ```
pub fn parse_scene_date(identity: &str) -> Result<NaiveDate> {
    identity
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| run.len() == 8)
        .find_map(|run| NaiveDate::parse_from_str(run, "%Y%m%d").ok())
        .ok_or_else(|| Error::DateParse(identity.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_catalog_ids() {
        assert_eq!(parse_scene_date("S2B_30STF_20250314_0_L2A").unwrap(), ymd(2025, 3, 14));
        assert_eq!(
            parse_scene_date("S2A_MSIL2A_20250502T110621_N0511_R137_T30STF_20250502T152109").unwrap(),
            ymd(2025, 5, 2)
        );
        assert_eq!(
            parse_scene_date("LC09_L2SP_202034_20250611_20250612_02_T1").unwrap(),
            ymd(2025, 6, 11)
        );
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(
            parse_scene_date("ndvi_S2B_30STF_20250314_0_L2A.tif").unwrap(),
            ymd(2025, 3, 14)
        );
    }

    #[test]
    fn test_skips_invalid_calendar_runs() {
        // 20251399 is not a date; the next run is
        assert_eq!(parse_scene_date("x_20251399_20250105").unwrap(), ymd(2025, 1, 5));
    }

    #[test]
    fn test_missing_date() {
        for id in ["S2B_30STF_L2A", "scene_2025031", "scene_202503140", ""] {
            assert!(matches!(parse_scene_date(id), Err(Error::DateParse(_))), "{id}");
        }
    }
}
