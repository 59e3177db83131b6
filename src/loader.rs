use crate::config::{Config, SourceSpec, TableLayout};
use crate::error::{EngineError, Result};
use crate::types::{is_standard_region, RegionMetricTable, Year};
use crate::util::{parse_f64_safe, parse_year_safe};
use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{debug, info, warn};

/// Official and romanized spellings mapped to the short region names.
static REGION_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let pairs: [(&str, &[&str]); 17] = [
        ("서울", &["서울특별시", "서울시", "Seoul"]),
        ("부산", &["부산광역시", "부산시", "Busan"]),
        ("대구", &["대구광역시", "대구시", "Daegu"]),
        ("인천", &["인천광역시", "인천시", "Incheon"]),
        ("광주", &["광주광역시", "광주시", "Gwangju"]),
        ("대전", &["대전광역시", "대전시", "Daejeon"]),
        ("울산", &["울산광역시", "울산시", "Ulsan"]),
        ("세종", &["세종특별자치시", "세종시", "Sejong"]),
        ("경기", &["경기도", "Gyeonggi"]),
        ("강원", &["강원도", "강원특별자치도", "Gangwon"]),
        ("충북", &["충청북도", "Chungbuk"]),
        ("충남", &["충청남도", "Chungnam"]),
        ("전북", &["전라북도", "전북특별자치도", "Jeonbuk"]),
        ("전남", &["전라남도", "Jeonnam"]),
        ("경북", &["경상북도", "Gyeongbuk"]),
        ("경남", &["경상남도", "Gyeongnam"]),
        ("제주", &["제주도", "제주특별자치도", "Jeju"]),
    ];
    let mut map = HashMap::new();
    for (short, aliases) in pairs {
        map.insert(short, short);
        for alias in aliases {
            map.insert(*alias, short);
        }
    }
    map
});

/// Short form of a region name; unknown names pass through trimmed.
pub fn canonical_region(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');
    match REGION_ALIASES.get(name) {
        Some(short) => short.to_string(),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub sources: usize,
    pub loaded: usize,
    /// (metric, reason) of every source that failed to load.
    pub failed: Vec<(String, String)>,
    /// Header columns that were neither a year nor a region.
    pub ignored_columns: usize,
    pub regions: usize,
    /// Region names outside the seventeen administrative regions.
    pub unknown_regions: Vec<String>,
}

/// Every successfully loaded metric table of one run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    tables: Vec<RegionMetricTable>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: RegionMetricTable) {
        self.tables.retain(|t| t.metric() != table.metric());
        self.tables.push(table);
    }

    /// A metric that is absent because its source failed is reported as
    /// a malformed source, so dependent reports fail instead of shrinking.
    pub fn get(&self, metric: &str) -> Result<&RegionMetricTable> {
        self.tables
            .iter()
            .find(|t| t.metric() == metric)
            .ok_or_else(|| EngineError::malformed(metric, "metric not loaded"))
    }

    pub fn tables(&self) -> &[RegionMetricTable] {
        &self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Load every configured source. A failing source is logged and recorded
/// in the report; the remaining sources still load.
pub fn load_dataset(config: &Config) -> (Dataset, LoadReport) {
    let mut dataset = Dataset::new();
    let mut report = LoadReport {
        sources: config.sources.len(),
        ..LoadReport::default()
    };
    for source in &config.sources {
        let path = config.source_path(source);
        match load_table(&path, source, config.years(), &config.exclude_regions) {
            Ok((table, ignored)) => {
                debug!(
                    "Loaded {} from {} ({} regions)",
                    source.metric,
                    path.display(),
                    table.regions().len()
                );
                for region in table.regions() {
                    if !is_standard_region(region) && !report.unknown_regions.contains(region) {
                        warn!("{}: unrecognized region '{}'", source.metric, region);
                        report.unknown_regions.push(region.clone());
                    }
                }
                report.ignored_columns += ignored;
                report.regions = report.regions.max(table.regions().len());
                report.loaded += 1;
                dataset.insert(table);
            }
            Err(e) => {
                warn!("Skipping {}: {}", source.metric, e);
                report.failed.push((source.metric.clone(), e.to_string()));
            }
        }
    }
    info!("Loaded {}/{} sources", report.loaded, report.sources);
    (dataset, report)
}

/// Load one source file. Returns the table and the number of ignored
/// header columns.
pub fn load_table(
    path: &Path,
    source: &SourceSpec,
    years: RangeInclusive<Year>,
    exclude: &[String],
) -> Result<(RegionMetricTable, usize)> {
    let file = File::open(path).map_err(|e| EngineError::malformed(path, e.to_string()))?;
    read_table(file, path, source, years, exclude)
}

pub fn read_table<R: Read>(
    reader: R,
    path: &Path,
    source: &SourceSpec,
    years: RangeInclusive<Year>,
    exclude: &[String],
) -> Result<(RegionMetricTable, usize)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let key = match &source.key_column {
        Some(name) => headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| EngineError::malformed(path, format!("no key column '{}'", name)))?,
        None => 0,
    };
    if headers.len() < 2 {
        return Err(EngineError::malformed(path, "expected a key column and value columns"));
    }

    let excluded = |name: &str| exclude.iter().any(|e| e == name);
    let mut table = RegionMetricTable::new(&source.metric, years.clone());
    let mut ignored = 0usize;

    match source.layout {
        TableLayout::RegionRows => {
            let mut columns: Vec<(usize, Year)> = Vec::new();
            for (i, h) in headers.iter().enumerate() {
                if i == key {
                    continue;
                }
                match parse_year_safe(Some(h.as_str())) {
                    Some(y) if years.contains(&y) => columns.push((i, y)),
                    _ => {
                        debug!("{}: ignoring column '{}'", path.display(), h);
                        ignored += 1;
                    }
                }
            }
            if columns.is_empty() {
                return Err(EngineError::malformed(path, "no year columns in range"));
            }
            for (row, record) in rdr.records().enumerate() {
                let record = record?;
                let region = match record.get(key).map(canonical_region) {
                    Some(r) if !r.is_empty() && !excluded(&r) => r,
                    _ => continue,
                };
                if table.regions().contains(&region) {
                    return Err(EngineError::malformed(
                        path,
                        format!("region '{}' appears twice", region),
                    ));
                }
                table.add_region(&region);
                for (col, year) in &columns {
                    if let Some(v) = cell(&record, *col, path, row, &headers)? {
                        table.insert(&region, *year, v);
                    }
                }
            }
        }
        TableLayout::YearRows => {
            let mut columns: Vec<(usize, String)> = Vec::new();
            for (i, h) in headers.iter().enumerate() {
                if i == key {
                    continue;
                }
                let region = canonical_region(h);
                if region.is_empty() || excluded(&region) || parse_year_safe(Some(h.as_str())).is_some() {
                    ignored += 1;
                    continue;
                }
                columns.push((i, region));
            }
            if columns.is_empty() {
                return Err(EngineError::malformed(path, "no region columns"));
            }
            for (_, region) in &columns {
                table.add_region(region);
            }
            let mut seen: Vec<Year> = Vec::new();
            for (row, record) in rdr.records().enumerate() {
                let record = record?;
                let year = match parse_year_safe(record.get(key)) {
                    Some(y) if years.contains(&y) => y,
                    Some(_) => continue,
                    None => {
                        debug!("{}: skipping row {} without a year key", path.display(), row + 2);
                        continue;
                    }
                };
                if seen.contains(&year) {
                    return Err(EngineError::malformed(path, format!("year {} appears twice", year)));
                }
                seen.push(year);
                for (col, region) in &columns {
                    if let Some(v) = cell(&record, *col, path, row, &headers)? {
                        table.insert(region, year, v);
                    }
                }
            }
        }
    }

    if table.is_empty() {
        return Err(EngineError::malformed(path, "no data rows"));
    }
    let missing = table.missing_cells();
    if let Some((region, year)) = missing.first() {
        return Err(EngineError::malformed(
            path,
            format!(
                "missing value for {} in {} ({} missing cells)",
                region,
                year,
                missing.len()
            ),
        ));
    }
    Ok((table, ignored))
}

/// `Ok(None)` for a blank cell, an error for a cell that is not a number.
fn cell(
    record: &StringRecord,
    col: usize,
    path: &Path,
    row: usize,
    headers: &[String],
) -> Result<Option<f64>> {
    let raw = match record.get(col) {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };
    match parse_f64_safe(Some(raw)) {
        Some(v) => Ok(Some(v)),
        None => Err(EngineError::malformed(
            path,
            format!(
                "row {}, column '{}': '{}' is not a number",
                row + 2,
                headers.get(col).map(String::as_str).unwrap_or("?"),
                raw
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn spec(layout: TableLayout, key: Option<&str>) -> SourceSpec {
        SourceSpec {
            metric: "m".to_string(),
            label: "M".to_string(),
            path: PathBuf::from("m.csv"),
            layout,
            key_column: key.map(str::to_string),
        }
    }

    fn read(csv: &str, layout: TableLayout, key: Option<&str>) -> Result<(RegionMetricTable, usize)> {
        read_table(
            csv.as_bytes(),
            Path::new("m.csv"),
            &spec(layout, key),
            2020..=2021,
            &["전국".to_string()],
        )
    }

    #[test]
    fn test_canonical_region() {
        assert_eq!(canonical_region("서울특별시"), "서울");
        assert_eq!(canonical_region(" Jeju "), "제주");
        assert_eq!(canonical_region("\u{feff}경기도"), "경기");
        assert_eq!(canonical_region("Atlantis"), "Atlantis");
    }

    #[test]
    fn test_region_rows_ignore_non_year_columns() {
        let csv = "지역,2020,2021,5년평균,2019\n서울특별시,\"1,200\",1300,1250,1100\n부산,800,900,850,700\n";
        let (table, ignored) = read(csv, TableLayout::RegionRows, Some("지역")).unwrap();
        assert_eq!(table.regions(), &["서울".to_string(), "부산".to_string()]);
        assert_eq!(table.get("서울", 2020), Some(1200.0));
        assert_eq!(table.get("부산", 2021), Some(900.0));
        assert_eq!(ignored, 2);
    }

    #[test]
    fn test_year_rows_with_bom_and_excluded_total() {
        let csv = "\u{feff}년도,서울,부산,전국\n2020년,10.5,9.5,10\n2021,11,10,10.5\n2022,12,11,11.5\n";
        let (table, ignored) = read(csv, TableLayout::YearRows, Some("년도")).unwrap();
        assert_eq!(table.regions().len(), 2);
        assert_eq!(table.get("서울", 2020), Some(10.5));
        assert_eq!(table.get("부산", 2021), Some(10.0));
        assert_eq!(table.get("서울", 2022), None);
        assert_eq!(ignored, 1);
    }

    #[test]
    fn test_blank_cell_is_data_quality_error() {
        let csv = "지역,2020,2021\n서울,1,2\n부산,3,\n";
        match read(csv, TableLayout::RegionRows, Some("지역")) {
            Err(EngineError::MalformedSource { reason, .. }) => {
                assert!(reason.contains("부산"), "{}", reason);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_year_row_is_data_quality_error() {
        let csv = "년도,서울,부산\n2020,1,2\n";
        assert!(matches!(
            read(csv, TableLayout::YearRows, None),
            Err(EngineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_non_numeric_cell_rejected() {
        let csv = "지역,2020,2021\n서울,1,abc\n";
        assert!(matches!(
            read(csv, TableLayout::RegionRows, None),
            Err(EngineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_missing_key_column_rejected() {
        let csv = "region,2020,2021\n서울,1,2\n";
        assert!(matches!(
            read(csv, TableLayout::RegionRows, Some("지역")),
            Err(EngineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_duplicate_region_rejected() {
        let csv = "지역,2020,2021\n서울,1,2\n서울특별시,1,2\n";
        assert!(read(csv, TableLayout::RegionRows, None).is_err());
    }

    #[test]
    fn test_load_dataset_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut good = File::create(dir.path().join("good.csv")).unwrap();
        writeln!(good, "년도,서울,부산").unwrap();
        for year in 2020..=2024 {
            writeln!(good, "{},{},{}", year, 10 + year - 2020, 5).unwrap();
        }
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            sources: vec![
                SourceSpec {
                    metric: "income".to_string(),
                    label: "소득".to_string(),
                    path: PathBuf::from("good.csv"),
                    layout: TableLayout::YearRows,
                    key_column: None,
                },
                SourceSpec {
                    metric: "doctors".to_string(),
                    label: "의사수".to_string(),
                    path: PathBuf::from("absent.csv"),
                    layout: TableLayout::RegionRows,
                    key_column: None,
                },
            ],
            ..Config::default()
        };
        let (dataset, report) = load_dataset(&config);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "doctors");
        assert_eq!(report.regions, 2);
        assert!(report.unknown_regions.is_empty());
        assert_eq!(dataset.get("income").unwrap().get("서울", 2024), Some(14.0));
        assert!(matches!(
            dataset.get("doctors"),
            Err(EngineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_load_dataset_flags_unrecognized_regions() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("smoking.csv")).unwrap();
        writeln!(file, "년도,서울특별시,Atlantis").unwrap();
        for year in 2020..=2024 {
            writeln!(file, "{},20.1,18.4", year).unwrap();
        }
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            sources: vec![SourceSpec {
                metric: "smoking".to_string(),
                label: "흡연율".to_string(),
                path: PathBuf::from("smoking.csv"),
                layout: TableLayout::YearRows,
                key_column: Some("년도".to_string()),
            }],
            ..Config::default()
        };
        let (dataset, report) = load_dataset(&config);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.unknown_regions, vec!["Atlantis".to_string()]);
        assert_eq!(dataset.get("smoking").unwrap().get("서울", 2020), Some(20.1));
    }
}
