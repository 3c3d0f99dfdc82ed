use serde::{Deserialize, Serialize};

pub const DEFAULT_SPECIALTY: &str = "General";
pub const DEFAULT_ZONE: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Stylist,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Stylist => "stylist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "client" => Some(Role::Client),
            "stylist" => Some(Role::Stylist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal bookings no longer occupy their slot.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    AtHome,
    InSalon,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::AtHome => "at_home",
            Modality::InSalon => "in_salon",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "at_home" => Some(Modality::AtHome),
            "in_salon" => Some(Modality::InSalon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub phone: String,
    pub role: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StylistRow {
    pub user_id: String,
    pub display_name: String,
    pub specialty: String,
    pub zone: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookingRow {
    pub id: String,
    pub client_id: String,
    pub stylist_id: String,
    pub service: String,
    pub date: String,
    pub time: String,
    pub modality: String,
    pub address: Option<String>,
    pub total: i64,
    pub status: String,
    pub requested_at: String,
}
