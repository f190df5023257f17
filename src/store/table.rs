use std::fmt;

use crate::record::{AlertKind, AlertRecord, KeyField};

/// One persisted raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Theft,
    Fill,
    LowFuel,
    DataLoss,
    TheftOffHighway,
    FillOffHighway,
}

/// Storage name and natural key of a [`Table`].
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub key: &'static [KeyField],
}

const VEHICLE_TIME: &[KeyField] = &[KeyField::VehicleId, KeyField::TimeMs];
const RECORD_ID: &[KeyField] = &[KeyField::Id];

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Theft,
        Table::Fill,
        Table::LowFuel,
        Table::DataLoss,
        Table::TheftOffHighway,
        Table::FillOffHighway,
    ];

    pub fn spec(&self) -> TableSpec {
        match self {
            Table::Theft => TableSpec { name: "theft", key: VEHICLE_TIME },
            Table::Fill => TableSpec { name: "fill", key: RECORD_ID },
            Table::LowFuel => TableSpec { name: "low_fuel", key: RECORD_ID },
            Table::DataLoss => TableSpec { name: "data_loss", key: VEHICLE_TIME },
            Table::TheftOffHighway => TableSpec { name: "theft_off_highway", key: VEHICLE_TIME },
            Table::FillOffHighway => TableSpec { name: "fill_off_highway", key: RECORD_ID },
        }
    }

    pub fn kind(&self) -> AlertKind {
        match self {
            Table::Theft | Table::TheftOffHighway => AlertKind::Theft,
            Table::Fill | Table::FillOffHighway => AlertKind::Fill,
            Table::LowFuel => AlertKind::LowFuel,
            Table::DataLoss => AlertKind::DataLoss,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.jsonl", self.spec().name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// All raw tables of one region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionTables {
    pub theft: Vec<AlertRecord>,
    pub fill: Vec<AlertRecord>,
    pub low_fuel: Vec<AlertRecord>,
    pub data_loss: Vec<AlertRecord>,
    pub theft_off_highway: Vec<AlertRecord>,
    pub fill_off_highway: Vec<AlertRecord>,
}

impl RegionTables {
    pub fn get(&self, table: Table) -> &Vec<AlertRecord> {
        match table {
            Table::Theft => &self.theft,
            Table::Fill => &self.fill,
            Table::LowFuel => &self.low_fuel,
            Table::DataLoss => &self.data_loss,
            Table::TheftOffHighway => &self.theft_off_highway,
            Table::FillOffHighway => &self.fill_off_highway,
        }
    }

    pub fn get_mut(&mut self, table: Table) -> &mut Vec<AlertRecord> {
        match table {
            Table::Theft => &mut self.theft,
            Table::Fill => &mut self.fill,
            Table::LowFuel => &mut self.low_fuel,
            Table::DataLoss => &mut self.data_loss,
            Table::TheftOffHighway => &mut self.theft_off_highway,
            Table::FillOffHighway => &mut self.fill_off_highway,
        }
    }

    pub fn take(&mut self, table: Table) -> Vec<AlertRecord> {
        std::mem::take(self.get_mut(table))
    }

    pub fn total_rows(&self) -> usize {
        Table::ALL.iter().map(|t| self.get(*t).len()).sum()
    }

    /// Copy restricted to records with `start_ms <= time_ms <= end_ms`.
    pub fn within(&self, start_ms: i64, end_ms: i64) -> RegionTables {
        let mut out = RegionTables::default();
        for table in Table::ALL {
            *out.get_mut(table) = self
                .get(table)
                .iter()
                .filter(|r| r.time_ms >= start_ms && r.time_ms <= end_ms)
                .cloned()
                .collect();
        }
        out
    }
}
