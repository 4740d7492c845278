use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::age::AgeClasses;
use crate::aggregate::PopulationRecord;
use crate::catalog::Sex;
use crate::error::{Error, Result};

/// One observation: population of a province in a (year, sex, age band) stratum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub year: i32,
    pub province: String,
    pub sex: Sex,
    pub age: u32,
    pub n: f64,
    pub age_class: String,
}

/// Tidy table of region × stratum populations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

impl Dataset {
    /// Label every record with its age class, keeping record order.
    ///
    /// Fails with a schema error if an age has no band or a
    /// (province, stratum) pair appears twice.
    pub fn assemble(records: Vec<PopulationRecord>, classes: &AgeClasses) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        for rec in records {
            if !seen.insert((rec.region.clone(), rec.key)) {
                return Err(Error::Schema(format!(
                    "duplicate record for `{}` in stratum {}",
                    rec.region, rec.key
                )));
            }
            let age_class = classes.classify(rec.key.age)?.to_string();
            rows.push(DatasetRow {
                year: rec.key.year,
                province: rec.region,
                sex: rec.key.sex,
                age: rec.key.age,
                n: rec.count,
                age_class,
            });
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total population per year over every province and stratum.
    pub fn totals_by_year(&self) -> BTreeMap<i32, f64> {
        let mut totals = BTreeMap::new();
        for row in &self.rows {
            *totals.entry(row.year).or_insert(0.0) += row.n;
        }
        totals
    }

    /// Female / male counts per age class for one province and year, ordered
    /// by band.
    pub fn age_pyramid(&self, province: &str, year: i32) -> Vec<PyramidBar> {
        // Keyed by age so bands come out youngest first.
        let mut bars: BTreeMap<u32, PyramidBar> = BTreeMap::new();
        for row in self.rows.iter().filter(|r| r.province == province && r.year == year) {
            let bar = bars.entry(row.age).or_insert_with(|| PyramidBar {
                age_class: row.age_class.clone(),
                female: 0.0,
                male: 0.0,
            });
            match row.sex {
                Sex::Female => bar.female += row.n,
                Sex::Male => bar.male += row.n,
            }
        }
        bars.into_values().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PyramidBar {
    pub age_class: String,
    pub female: f64,
    pub male: f64,
}
