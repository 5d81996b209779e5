use std::io::Cursor;

use calamine::{Data, Reader, Xls, Xlsx};
use chrono::NaiveTime;
use heck::ToSnakeCase;

use super::{ImportError, TabularFormat};

/// One data row, keyed by normalized header names. Spreadsheet numbering:
/// the header is row 1, so the first data row is 2. Cells keep the sheet's
/// column order; left-to-right position breaks ties when two columns mean
/// the same thing.
#[derive(Debug, Clone)]
pub struct Row {
    pub number: usize,
    values: Vec<(String, String)>,
}

impl Row {
    pub fn get(&self, key: &str) -> &str {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map_or("", |(_, v)| v.trim())
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|(_, v)| v.trim().is_empty())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.trim()))
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().to_snake_case()
}

/// Decodes the raw upload into rows. The format is whatever the caller
/// declared; the bytes are never sniffed.
pub fn decode(data: &[u8], format: TabularFormat) -> Result<Vec<Row>, ImportError> {
    match format {
        TabularFormat::Csv => decode_csv(data),
        TabularFormat::Xls => {
            let workbook = Xls::new(Cursor::new(data)).map_err(|e| decode_error(format, e))?;
            decode_workbook(workbook, format)
        }
        TabularFormat::Xlsx => {
            let workbook = Xlsx::new(Cursor::new(data)).map_err(|e| decode_error(format, e))?;
            decode_workbook(workbook, format)
        }
    }
}

fn decode_error<E: std::fmt::Display>(format: TabularFormat, err: E) -> ImportError {
    ImportError::Decode {
        format,
        message: err.to_string(),
    }
}

fn decode_csv(data: &[u8]) -> Result<Vec<Row>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| decode_error(TabularFormat::Csv, e))?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| decode_error(TabularFormat::Csv, e))?;

        let values = headers
            .iter()
            .cloned()
            .zip(record.iter().map(String::from))
            .collect();

        rows.push(Row {
            number: i + 2,
            values,
        });
    }

    Ok(rows)
}

fn decode_workbook<RS, R>(mut workbook: R, format: TabularFormat) -> Result<Vec<Row>, ImportError>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| decode_error(format, "workbook has no worksheets"))?
        .map_err(|e| decode_error(format, e))?;

    let mut row_iter = range.rows();

    let Some(header_row) = row_iter.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| normalize_header(&cell_to_string(cell)))
        .collect();

    let rows = row_iter
        .enumerate()
        .map(|(i, cells)| {
            let values = headers
                .iter()
                .cloned()
                .zip(cells.iter().map(cell_to_string))
                .collect();

            Row {
                number: i + 2,
                values,
            }
        })
        .collect();

    Ok(rows)
}

/// Renders a cell the way the reconciler's parsers expect: dates as
/// `%Y-%m-%d`, times as `%H:%M:%S`, whole floats without a trailing `.0`.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::DateTime(dt) => {
            let Some(naive) = dt.as_datetime() else {
                return String::new();
            };

            if dt.as_f64() < 1.0 {
                naive.format("%H:%M:%S").to_string()
            } else if naive.time() == NaiveTime::MIN {
                naive.format("%Y-%m-%d").to_string()
            } else {
                naive.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{TabularFormat, decode};

    #[test]
    fn csv_rows_use_spreadsheet_numbering_and_snake_case_headers() {
        let data = b"Site ID,Survey Date,Water Temperature\nPNT-01,2024-06-10,18.2\nBIG-02,2024-06-11,17.9\n";

        let rows = decode(data, TabularFormat::Csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, 2);
        assert_eq!(rows[1].number, 3);
        assert_eq!(rows[0].get("site_id"), "PNT-01");
        assert_eq!(rows[1].get("water_temperature"), "17.9");
    }

    #[test]
    fn missing_columns_read_as_empty() {
        let data = b"site_id,survey_date\nPNT-01,2024-06-10\n";

        let rows = decode(data, TabularFormat::Csv).unwrap();

        assert_eq!(rows[0].get("sample_barcode"), "");
        assert!(!rows[0].is_blank());
    }

    #[test]
    fn garbage_xlsx_is_a_decode_error() {
        assert!(decode(b"not a zip archive", TabularFormat::Xlsx).is_err());
    }
}
