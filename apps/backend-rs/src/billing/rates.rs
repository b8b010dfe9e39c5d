use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Building, Room};

/// Effective unit prices for one room. `None` means neither the room nor its
/// building configures a price for that utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RateConfig {
    pub electricity_unit_price: Option<Decimal>,
    pub water_unit_price: Option<Decimal>,
    pub hot_water_unit_price: Option<Decimal>,
}

/// Room-level prices win over the building defaults, utility by utility.
pub fn resolve(room: &Room, building: &Building) -> RateConfig {
    RateConfig {
        electricity_unit_price: room
            .electricity_unit_price
            .or(building.electricity_unit_price),
        water_unit_price: room.water_unit_price.or(building.water_unit_price),
        hot_water_unit_price: room.hot_water_unit_price.or(building.hot_water_unit_price),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::models::{Building, RentalStatus, Room};

    pub fn building(
        electricity: Option<Decimal>,
        water: Option<Decimal>,
        hot_water: Option<Decimal>,
    ) -> Building {
        let now = Utc::now();
        Building {
            id: Uuid::new_v4(),
            name: "B1".to_string(),
            landlord_name: None,
            electricity_unit_price: electricity,
            water_unit_price: water,
            hot_water_unit_price: hot_water,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn room(building: &Building) -> Room {
        let now = Utc::now();
        Room {
            id: Uuid::new_v4(),
            building_id: building.id,
            room_number: "R101".to_string(),
            rent: dec!(2000),
            default_deposit: Some(dec!(2000)),
            electricity_unit_price: None,
            water_unit_price: None,
            hot_water_unit_price: None,
            rental_status: RentalStatus::Rented,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}
