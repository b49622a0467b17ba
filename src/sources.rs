/// Dataset holding SEAS5 (and other C3S) monthly seasonal forecasts.
pub const SEAS5_DATASET: &str = "seasonal-monthly-single-levels";

/// ERA5 monthly averaged reanalysis on single levels.
pub const ERA5_DATASET: &str = "reanalysis-era5-single-levels-monthly-means";

pub const DEFAULT_SOURCE: &str = "cds";

/// Built-in API roots of the Copernicus data stores.
///
/// If `source` is already an `http(s)` URL, it is used as-is.
pub fn source_to_base_url(source: &str) -> Option<&'static str> {
    match source {
        "cds" => Some("https://cds.climate.copernicus.eu/api"),
        "ads" => Some("https://ads.atmosphere.copernicus.eu/api"),
        "ewds" => Some("https://ewds.climate.copernicus.eu/api"),
        _ => None,
    }
}

pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
