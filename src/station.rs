use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Latitude and longitude used to centre city-wide maps
pub const CITY_CENTRE: (f64, f64) = (-22.91, -43.17);

/// The air quality monitoring stations of the municipal network.
///
/// Variants are declared in alphabetical order of their names, so the derived ordering sorts
/// by station name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Station {
    Bangu,
    CampoGrande,
    Centro,
    Copacabana,
    Iraja,
    PedraDeGuaratiba,
    SaoCristovao,
    Tijuca,
}

impl Station {
    pub const ALL: [Self; 8] = [
        Self::Bangu,
        Self::CampoGrande,
        Self::Centro,
        Self::Copacabana,
        Self::Iraja,
        Self::PedraDeGuaratiba,
        Self::SaoCristovao,
        Self::Tijuca,
    ];

    /// The station name as written in the sensor tables
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bangu => "ESTAÇÃO BANGU",
            Self::CampoGrande => "ESTAÇÃO CAMPO GRANDE",
            Self::Centro => "ESTAÇÃO CENTRO",
            Self::Copacabana => "ESTAÇÃO COPACABANA",
            Self::Iraja => "ESTAÇÃO IRAJÁ",
            Self::PedraDeGuaratiba => "ESTAÇÃO PEDRA DE GUARATIBA",
            Self::SaoCristovao => "ESTAÇÃO SÃO CRISTÓVÃO",
            Self::Tijuca => "ESTAÇÃO TIJUCA",
        }
    }

    /// `(latitude, longitude)` in decimal degrees
    pub const fn coordinates(self) -> (f64, f64) {
        match self {
            Self::Bangu => (-22.88, -43.47),
            Self::CampoGrande => (-22.90, -43.56),
            Self::Centro => (-22.91, -43.18),
            Self::Copacabana => (-22.97, -43.19),
            Self::Iraja => (-22.82, -43.32),
            Self::PedraDeGuaratiba => (-23.02, -43.60),
            Self::SaoCristovao => (-22.90, -43.23),
            Self::Tijuca => (-22.92, -43.24),
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Upper-cases and strips the Portuguese diacritics that appear in station names.
fn fold(name: &str) -> String {
    name.trim()
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'Á' | 'À' | 'Â' | 'Ã' => 'A',
            'É' | 'Ê' => 'E',
            'Í' => 'I',
            'Ó' | 'Ô' | 'Õ' => 'O',
            'Ú' => 'U',
            'Ç' => 'C',
            '_' | '-' => ' ',
            c => c,
        })
        .collect()
}

impl FromStr for Station {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = fold(s);
        let name = folded.strip_prefix("ESTACAO ").unwrap_or(&folded).trim();
        let station = match name {
            "BANGU" => Self::Bangu,
            "CAMPO GRANDE" => Self::CampoGrande,
            "CENTRO" => Self::Centro,
            "COPACABANA" => Self::Copacabana,
            "IRAJA" => Self::Iraja,
            "PEDRA DE GUARATIBA" | "PEDRA GUARATIBA" => Self::PedraDeGuaratiba,
            "SAO CRISTOVAO" => Self::SaoCristovao,
            "TIJUCA" => Self::Tijuca,
            _ => return Err(Error::UnknownName(s.to_owned())),
        };
        Ok(station)
    }
}
