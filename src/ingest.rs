//! CSV time-series ingestion.
//!
//! Every file has a `timestamp` first column followed by numeric columns.
//! Files are read once at startup.

use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::config::DataConfig;
use crate::error::DataError;

/// A parsed CSV file: timestamp labels plus named numeric columns.
#[derive(Debug, Clone, Default)]
pub struct SeriesTable {
    source: String,
    timestamps: Vec<String>,
    columns: Vec<(String, Vec<f64>)>,
}

impl SeriesTable {
    /// Reads a CSV file from disk.
    ///
    /// # Errors
    ///
    /// Returns a `DataError` if the file cannot be read, a value does not
    /// parse, or there are no data rows.
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let label = path.display().to_string();
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| DataError::Csv {
                path: label.clone(),
                source,
            })?;
        Self::parse(reader, label)
    }

    /// Reads CSV data from any reader; `source` names it in errors.
    pub fn from_reader<R: Read>(rdr: R, source: &str) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);
        Self::parse(reader, source.to_string())
    }

    fn parse<R: Read>(mut reader: csv::Reader<R>, source: String) -> Result<Self, DataError> {
        let headers = reader
            .headers()
            .map_err(|e| DataError::Csv {
                path: source.clone(),
                source: e,
            })?
            .clone();

        let mut columns: Vec<(String, Vec<f64>)> = headers
            .iter()
            .skip(1)
            .map(|h| (h.to_string(), Vec::new()))
            .collect();
        let mut timestamps = Vec::new();

        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| DataError::Csv {
                path: source.clone(),
                source: e,
            })?;
            // header is line 1
            let row = i + 2;
            timestamps.push(record.get(0).unwrap_or_default().to_string());

            for (j, (name, values)) in columns.iter_mut().enumerate() {
                let raw = record.get(j + 1).unwrap_or_default();
                let value = raw.parse::<f64>().map_err(|_| DataError::Parse {
                    path: source.clone(),
                    row,
                    column: name.clone(),
                    value: raw.to_string(),
                })?;
                values.push(value);
            }
        }

        if timestamps.is_empty() {
            return Err(DataError::Empty { path: source });
        }

        Ok(Self {
            source,
            timestamps,
            columns,
        })
    }

    /// Values of the named column.
    ///
    /// # Errors
    ///
    /// Returns `DataError::MissingColumn` if no column has that header.
    pub fn column(&self, name: &str) -> Result<&[f64], DataError> {
        self.columns
            .iter()
            .find(|(h, _)| h == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| DataError::MissingColumn {
                path: self.source.clone(),
                column: name.to_string(),
            })
    }

    /// Names of the numeric columns, in file order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(h, _)| h.as_str())
    }

    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// File name or label used in errors.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// All CSV inputs of a run.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    /// `timestamp` plus one kW column per PV series.
    pub solar: Option<SeriesTable>,
    /// `timestamp,co2_per_kwh`.
    pub carbon: Option<SeriesTable>,
    /// `timestamp,import_price,export_price`.
    pub price: Option<SeriesTable>,
}

impl DataSet {
    /// Loads every configured file and checks the required columns.
    ///
    /// # Errors
    ///
    /// Returns the first `DataError` encountered.
    pub fn load(config: &DataConfig) -> Result<Self, DataError> {
        let read = |path: &Option<std::path::PathBuf>| -> Result<Option<SeriesTable>, DataError> {
            match path {
                Some(p) => {
                    let table = SeriesTable::from_path(p)?;
                    info!(path = %p.display(), rows = table.len(), "loaded series");
                    Ok(Some(table))
                }
                None => Ok(None),
            }
        };

        let data = Self {
            solar: read(&config.solar_csv)?,
            carbon: read(&config.carbon_csv)?,
            price: read(&config.price_csv)?,
        };
        data.check_columns()?;
        Ok(data)
    }

    fn check_columns(&self) -> Result<(), DataError> {
        if let Some(carbon) = &self.carbon {
            carbon.column("co2_per_kwh")?;
        }
        if let Some(price) = &self.price {
            price.column("import_price")?;
            price.column("export_price")?;
        }
        Ok(())
    }
}
