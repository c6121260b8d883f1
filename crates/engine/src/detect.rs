use crate::config::Route;

/// First route (in priority order) whose patterns match `file_name`.
///
/// Routes are expected in catalog order, which places the more specific
/// patterns (`ZONA_PON_REALIZAT_`) ahead of the generic ones (`ZONA_`).
pub fn detect<'a, I>(file_name: &str, routes: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a Route>,
{
    routes
        .into_iter()
        .find(|route| route.matches(file_name))
        .map(|route| route.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilePattern, PatternKind};

    fn route(id: &str, patterns: &[&str]) -> Route {
        Route {
            id: id.into(),
            group: "main".into(),
            patterns: patterns
                .iter()
                .map(|p| FilePattern::new(PatternKind::Contains, p))
                .collect(),
        }
    }

    fn priority() -> Vec<Route> {
        vec![
            route("zona_pon_re_ftth1000", &["ZONA_PON_REALIZAT_FTTH1000"]),
            route("zona_pon", &["ZONA_PON_REALIZAT_", "ZONA_PON_"]),
            route("zona_hub", &["ZONA_ACOPERIRE_HUB_"]),
            route("zone_interventie", &["ZONA_", "ZONE_"]),
        ]
    }

    #[test]
    fn first_match_wins() {
        let routes = priority();
        assert_eq!(
            detect("ZONA_PON_REALIZAT_FTTH1000_VASLUI.geojson", &routes),
            Some("zona_pon_re_ftth1000")
        );
        assert_eq!(detect("ZONA_PON_REALIZAT_VASLUI.geojson", &routes), Some("zona_pon"));
        assert_eq!(detect("ZONA_ACOPERIRE_HUB_HUSI.geojson", &routes), Some("zona_hub"));
        assert_eq!(detect("ZONA_BARLAD.geojson", &routes), Some("zone_interventie"));
    }

    #[test]
    fn overlap_follows_priority_not_pattern_length() {
        // Reversing the order hands everything to the generic model.
        let mut routes = priority();
        routes.reverse();
        assert_eq!(
            detect("ZONA_PON_REALIZAT_VASLUI.geojson", &routes),
            Some("zone_interventie")
        );
    }

    #[test]
    fn match_is_case_insensitive() {
        let routes = priority();
        assert_eq!(detect("zona_pon_realizat_vaslui.geojson", &routes), Some("zona_pon"));
        assert_eq!(detect("Zone_Husi.json", &routes), Some("zone_interventie"));
    }

    #[test]
    fn no_match_is_none() {
        let routes = priority();
        assert_eq!(detect("STALPI_VASLUI.geojson", &routes), None);
        assert_eq!(detect("", &routes), None);
        assert_eq!(detect("ZONA_X.geojson", std::iter::empty()), None);
    }
}
