//! Reading the station and hospital CSV sources into typed records.
//!
//! Both readers check the header against the required columns before touching any row, so a
//! renamed column fails the whole load instead of silently yielding missing values.

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::admissions::HospitalAdmissionRecord;
use crate::field::{Field, Measurements};
use crate::period::YearMonth;
use crate::reading::SensorReading;
use crate::station::Station;
use crate::{Error, Result};

const SENSOR_COLUMNS: [&str; 13] = [
    "nome_estacao",
    "data",
    "pm2_5",
    "pm10",
    "co",
    "no",
    "no2",
    "nox",
    "so2",
    "o3",
    "chuva",
    "temp",
    "ur",
];

const ADMISSION_COLUMNS: [&str; 13] = [
    "UF_ZI",
    "ANO_CMPT",
    "MES_CMPT",
    "MUNIC_RES",
    "NASC",
    "SEXO",
    "DT_INTER",
    "DT_SAIDA",
    "DIAG_PRINC",
    "DIAG_SECUN",
    "IDADE",
    "DIAS_PERM",
    "MORTE",
];

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Deserialize)]
struct SensorRow {
    nome_estacao: String,
    data: String,
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    co: Option<f64>,
    no: Option<f64>,
    no2: Option<f64>,
    nox: Option<f64>,
    so2: Option<f64>,
    o3: Option<f64>,
    chuva: Option<f64>,
    temp: Option<f64>,
    ur: Option<f64>,
}

impl SensorRow {
    fn measurements(&self) -> Measurements {
        let mut values = Measurements::default();
        for (field, value) in [
            (Field::Pm25, self.pm2_5),
            (Field::Pm10, self.pm10),
            (Field::Co, self.co),
            (Field::No, self.no),
            (Field::No2, self.no2),
            (Field::Nox, self.nox),
            (Field::So2, self.so2),
            (Field::O3, self.o3),
            (Field::Rainfall, self.chuva),
            (Field::Temperature, self.temp),
            (Field::Humidity, self.ur),
        ] {
            values.set(field, value);
        }
        values
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct AdmissionRow {
    uf_zi: u32,
    ano_cmpt: i32,
    mes_cmpt: u32,
    munic_res: Option<u32>,
    nasc: Option<String>,
    sexo: Option<u8>,
    dt_inter: String,
    dt_saida: Option<String>,
    diag_princ: Option<String>,
    diag_secun: Option<String>,
    idade: Option<u32>,
    dias_perm: Option<u32>,
    morte: Option<u8>,
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_compact_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok()
}

fn check_columns(headers: &csv::StringRecord, required: &[&str], source_name: &str) -> Result<()> {
    for column in required {
        if !headers.iter().any(|header| header.trim() == *column) {
            return Err(Error::Schema {
                source_name: source_name.to_owned(),
                column: (*column).to_owned(),
            });
        }
    }
    Ok(())
}

fn reader<R: Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(rdr)
}

// Header is line 1, so the n-th data row sits on line n + 2.
fn row_error(source_name: &str, index: usize, reason: impl std::fmt::Display) -> Error {
    Error::ingestion(source_name, format!("line {}: {reason}", index + 2))
}

/// Read hourly station readings from any CSV source.
///
/// # Errors
/// Fails with [`Error::Schema`] when a required column is absent and with
/// [`Error::Ingestion`] on the first row that does not parse.
pub fn read_sensor_csv<R: Read>(rdr: R, source_name: &str) -> Result<Vec<SensorReading>> {
    let mut rdr = reader(rdr);
    check_columns(rdr.headers()?, &SENSOR_COLUMNS, source_name)?;

    let mut readings = vec![];
    for (index, result) in rdr.deserialize().enumerate() {
        let row: SensorRow = result.map_err(|err| row_error(source_name, index, err))?;
        let station = row
            .nome_estacao
            .parse::<Station>()
            .map_err(|err| row_error(source_name, index, err))?;
        let timestamp = parse_timestamp(&row.data).ok_or_else(|| {
            row_error(source_name, index, format!("unrecognised timestamp `{}`", row.data))
        })?;
        readings.push(SensorReading {
            station,
            timestamp,
            values: row.measurements(),
        });
    }

    tracing::info!(source = source_name, rows = readings.len(), "loaded sensor readings");
    Ok(readings)
}

fn open(path: &Path) -> Result<(fs::File, String)> {
    let source_name = path.display().to_string();
    let file =
        fs::File::open(path).map_err(|err| Error::ingestion(&source_name, err.to_string()))?;
    Ok((file, source_name))
}

/// Read one station CSV from disk
///
/// # Errors
/// Fails when the file cannot be opened or does not parse as in [`read_sensor_csv`].
pub fn load_sensor_file(path: &Path) -> Result<Vec<SensorReading>> {
    let (file, source_name) = open(path)?;
    read_sensor_csv(file, &source_name)
}

/// Read hospital admission records from any CSV source.
///
/// Dates are `YYYYMMDD`. A missing or unparsable admission date fails the row, the other dates
/// become missing when they do not parse.
///
/// # Errors
/// Fails with [`Error::Schema`] when a required column is absent and with
/// [`Error::Ingestion`] on the first row that does not parse.
pub fn read_admission_csv<R: Read>(
    rdr: R,
    source_name: &str,
) -> Result<Vec<HospitalAdmissionRecord>> {
    let mut rdr = reader(rdr);
    check_columns(rdr.headers()?, &ADMISSION_COLUMNS, source_name)?;

    let mut records = vec![];
    for (index, result) in rdr.deserialize().enumerate() {
        let row: AdmissionRow = result.map_err(|err| row_error(source_name, index, err))?;
        let admission_date = parse_compact_date(&row.dt_inter).ok_or_else(|| {
            row_error(
                source_name,
                index,
                format!("unrecognised admission date `{}`", row.dt_inter),
            )
        })?;
        records.push(HospitalAdmissionRecord {
            municipality_code: row.uf_zi,
            competence: YearMonth::new(row.ano_cmpt, row.mes_cmpt),
            residence_code: row.munic_res,
            birth_date: row.nasc.as_deref().and_then(parse_compact_date),
            sex: row.sexo,
            admission_date,
            discharge_date: row.dt_saida.as_deref().and_then(parse_compact_date),
            principal_diagnosis: row.diag_princ,
            secondary_diagnosis: row.diag_secun,
            age: row.idade,
            length_of_stay: row.dias_perm,
            died: row.morte == Some(1),
        });
    }

    tracing::info!(source = source_name, rows = records.len(), "loaded admission records");
    Ok(records)
}

/// Read one yearly hospital CSV from disk
///
/// # Errors
/// Fails when the file cannot be opened or does not parse as in [`read_admission_csv`].
pub fn load_admission_file(path: &Path) -> Result<Vec<HospitalAdmissionRecord>> {
    let (file, source_name) = open(path)?;
    read_admission_csv(file, &source_name)
}
