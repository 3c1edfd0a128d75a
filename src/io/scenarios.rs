use std::io::Read;

use anyhow::Context;

use crate::model::scenario::ScenarioParameters;

/// Load scenarios from a CSV file, one row per locality.
///
/// Headers may use the English field names (`id`, `population`, ...) or the
/// legacy workbook names (`Escenario`/`Localidad`, `Poblacion`, `Inicial`,
/// `Beta1`, `Beta_medidas`, `Dias`, ...). Empty optional cells are absent.
pub fn load_scenarios_csv(path: &str) -> anyhow::Result<Vec<ScenarioParameters>> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open scenario CSV: {}", path))?;
    read_scenarios(file).with_context(|| format!("Failed to read scenario CSV: {}", path))
}

pub fn read_scenarios<R: Read>(reader: R) -> anyhow::Result<Vec<ScenarioParameters>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut scenarios = Vec::new();
    for (idx, result) in rdr.deserialize::<ScenarioParameters>().enumerate() {
        // +2: one for the header line, one for 1-based numbering
        let row = result.with_context(|| format!("invalid scenario on line {}", idx + 2))?;
        scenarios.push(row);
    }
    Ok(scenarios)
}
