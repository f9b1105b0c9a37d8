use super::Cell;
use crate::models::food::Food;
use crate::models::food_entry::FoodEntry;
use crate::models::food_plan::FoodPlan;
use crate::models::medical_center::MedicalCenter;
use crate::models::provider::Provider;
use crate::models::stock::Stock;
use crate::models::unit::UnitOfMeasurement;
use crate::models::user::User;

/// Flattens an entity into one table row.
pub trait Tabular {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<Cell>;
}

fn join<I: IntoIterator<Item = String>>(parts: I) -> Cell {
    Cell::Text(parts.into_iter().collect::<Vec<_>>().join("; "))
}

impl Tabular for UnitOfMeasurement {
    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Symbol", "Created", "Updated"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            self.id.to_string().into(),
            self.name.as_str().into(),
            self.symbol.clone().into(),
            self.created_at.as_str().into(),
            self.updated_at.as_str().into(),
        ]
    }
}

impl Tabular for Food {
    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Unit", "Description", "Created", "Updated"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            self.id.to_string().into(),
            self.name.as_str().into(),
            self.unit_of_measurement.name.as_str().into(),
            self.description.clone().into(),
            self.created_at.as_str().into(),
            self.updated_at.as_str().into(),
        ]
    }
}

impl Tabular for Provider {
    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Contact person", "Email", "Phone", "Address", "Created", "Updated"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            self.id.to_string().into(),
            self.name.as_str().into(),
            self.contact_person.clone().into(),
            self.email.clone().into(),
            self.phone_number.clone().into(),
            self.address.clone().into(),
            self.created_at.as_str().into(),
            self.updated_at.as_str().into(),
        ]
    }
}

impl Tabular for MedicalCenter {
    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Address", "Email", "Phone", "Created", "Updated"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            self.id.to_string().into(),
            self.name.as_str().into(),
            self.address.as_str().into(),
            self.email.clone().into(),
            self.phone_number.clone().into(),
            self.created_at.as_str().into(),
            self.updated_at.as_str().into(),
        ]
    }
}

impl Tabular for FoodPlan {
    fn headers() -> &'static [&'static str] {
        &[
            "ID",
            "Name",
            "Medical center",
            "Type",
            "Start",
            "End",
            "Status",
            "Planned foods",
            "Planned total",
            "Real total",
            "Completed %",
        ]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            self.id.to_string().into(),
            self.name.as_str().into(),
            self.medical_center.name.as_str().into(),
            self.plan_type.as_str().into(),
            self.start_date.to_string().into(),
            self.end_date.to_string().into(),
            self.status.as_str().into(),
            join(self.planned_foods.iter().map(|p| format!("{} x{} ({})", p.food.name, p.quantity, p.provider.name))),
            self.progress.planned_total.into(),
            self.progress.real_total.into(),
            self.progress.percentage_completed.into(),
        ]
    }
}

impl Tabular for FoodEntry {
    fn headers() -> &'static [&'static str] {
        &["ID", "Date", "Medical center", "Provider", "Food plan", "Entered foods", "Total quantity"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            self.id.to_string().into(),
            self.entry_date.to_string().into(),
            self.medical_center.name.as_str().into(),
            self.provider.name.as_str().into(),
            self.food_plan.name.as_str().into(),
            join(self.entered_foods.iter().map(|f| format!("{} x{}", f.food.name, f.quantity))),
            self.total_quantity().into(),
        ]
    }
}

impl Tabular for Stock {
    fn headers() -> &'static [&'static str] {
        &["ID", "Medical center", "Food", "Quantity", "Unit", "Updated"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            self.id.to_string().into(),
            self.medical_center.name.as_str().into(),
            self.food.name.as_str().into(),
            self.quantity.into(),
            self.unit_of_measurement.symbol.clone().unwrap_or_else(|| self.unit_of_measurement.name.clone()).into(),
            self.updated_at.as_str().into(),
        ]
    }
}

impl Tabular for User {
    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Email", "Role", "Created", "Updated"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            self.id.to_string().into(),
            self.name.as_str().into(),
            self.email.as_str().into(),
            self.role.as_str().into(),
            self.created_at.as_str().into(),
            self.updated_at.as_str().into(),
        ]
    }
}
