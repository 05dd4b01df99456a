use checkin::{ModeConfig, SessionStatus, SessionView, VerifyError};
use checkin::geofence::DEFAULT_RADIUS_M;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// A check-in session row. Per-mode parameters live in nullable columns;
/// [`Model::view`] turns the row into the typed configuration the
/// verification engine consumes.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub group_id: i64,
    pub creator_id: i64,
    pub title: String,
    pub mode: CheckinMode,
    /// Join code, generated for every session regardless of mode.
    pub code: String,
    pub gesture_digit: Option<i32>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_radius_m: Option<f64>,
    pub duration_minutes: i32,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "checkin_mode")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CheckinMode {
    #[sea_orm(string_value = "code")]
    Code,
    #[sea_orm(string_value = "gesture")]
    Gesture,
    #[sea_orm(string_value = "location")]
    Location,
    #[sea_orm(string_value = "face")]
    Face,
    #[sea_orm(string_value = "group_photo")]
    GroupPhoto,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_session_status")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Status {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "ended")]
    Ended,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chat_group::Entity",
        from = "Column::GroupId",
        to = "super::chat_group::Column::Id"
    )]
    Group,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id"
    )]
    Creator,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::chat_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Per-mode parameters supplied at creation time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionParams {
    pub gesture_digit: Option<u8>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_m: Option<f64>,
}

#[derive(Debug, Error)]
pub enum CreateSessionError {
    #[error("gesture check-in needs a digit between 1 and 5")]
    InvalidGestureDigit,
    #[error("location check-in needs latitude and longitude")]
    MissingLocation,
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl Model {
    /// Create a session. Validates the per-mode parameters, fills the
    /// location radius default, and generates the join code.
    pub async fn create(
        db: &DatabaseConnection,
        group_id: i64,
        creator_id: i64,
        title: &str,
        mode: CheckinMode,
        params: SessionParams,
        duration_minutes: i32,
        now: DateTime<Utc>,
    ) -> Result<Self, CreateSessionError> {
        let gesture_digit = match mode {
            CheckinMode::Gesture => match params.gesture_digit {
                Some(d @ 1..=5) => Some(d as i32),
                _ => return Err(CreateSessionError::InvalidGestureDigit),
            },
            _ => None,
        };
        let (lat, lng, radius) = match mode {
            CheckinMode::Location => match (params.latitude, params.longitude) {
                (Some(lat), Some(lng)) => (
                    Some(lat),
                    Some(lng),
                    Some(params.radius_m.unwrap_or(DEFAULT_RADIUS_M)),
                ),
                _ => return Err(CreateSessionError::MissingLocation),
            },
            _ => (None, None, None),
        };

        let session = ActiveModel {
            group_id: Set(group_id),
            creator_id: Set(creator_id),
            title: Set(title.to_owned()),
            mode: Set(mode),
            code: Set(generate_join_code()),
            gesture_digit: Set(gesture_digit),
            location_lat: Set(lat),
            location_lng: Set(lng),
            location_radius_m: Set(radius),
            duration_minutes: Set(duration_minutes),
            status: Set(Status::Active),
            created_at: Set(now),
            end_time: Set(now + Duration::minutes(duration_minutes as i64)),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(session.insert(db).await?)
    }

    /// Explicit close: ends the session now and pulls `end_time` in so
    /// the row records when the window actually shut.
    pub async fn close(&self, db: &DatabaseConnection) -> Result<Self, DbErr> {
        let now = Utc::now();
        let mut active: ActiveModel = self.clone().into();
        active.status = Set(Status::Ended);
        active.end_time = Set(now);
        active.updated_at = Set(now);
        active.update(db).await
    }

    /// The status a reader should see: expiry is lazy, so a stored
    /// `active` past `end_time` displays as ended.
    pub fn display_status(&self, now: DateTime<Utc>) -> Status {
        if self.status == Status::Active && now > self.end_time {
            Status::Ended
        } else {
            self.status
        }
    }

    /// Typed view for the verification engine. Fails when the row's
    /// per-mode columns are inconsistent with its mode.
    pub fn view(&self) -> Result<SessionView, VerifyError> {
        let config = match self.mode {
            CheckinMode::Code => ModeConfig::Code {
                code: self.code.clone(),
            },
            CheckinMode::Gesture => match self.gesture_digit {
                Some(d) => ModeConfig::Gesture { digit: d as u8 },
                None => return Err(VerifyError::ModeMismatch),
            },
            CheckinMode::Location => match (self.location_lat, self.location_lng) {
                (Some(lat), Some(lng)) => ModeConfig::Location {
                    lat,
                    lng,
                    radius_m: self.location_radius_m.unwrap_or(DEFAULT_RADIUS_M),
                },
                _ => return Err(VerifyError::TargetUnset),
            },
            CheckinMode::Face => ModeConfig::Face,
            CheckinMode::GroupPhoto => ModeConfig::GroupPhoto,
        };

        Ok(SessionView {
            id: self.id,
            creator_id: self.creator_id,
            group_id: Some(self.group_id),
            created_at: self.created_at,
            end_time: self.end_time,
            status: match self.status {
                Status::Active => SessionStatus::Active,
                Status::Ended => SessionStatus::Ended,
            },
            config,
        })
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn created_by(db: &DatabaseConnection, creator_id: i64) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::CreatorId.eq(creator_id))
            .all(db)
            .await
    }

    /// Sessions currently open in any of the given groups. The time bound
    /// is applied here so lazily-expired rows never show up as open.
    pub async fn active_in_groups(
        db: &DatabaseConnection,
        group_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::GroupId.is_in(group_ids.iter().copied()))
            .filter(Column::Status.eq(Status::Active))
            .filter(Column::EndTime.gte(now))
            .all(db)
            .await
    }
}

/// 8-character uppercase hex join code.
fn generate_join_code() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes).to_uppercase()
}
