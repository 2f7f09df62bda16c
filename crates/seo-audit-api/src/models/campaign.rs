//! Local-SEO geo-grid campaigns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::keyword::Frequency;
use super::scan::ScanStatus;
use crate::utils::validation::not_blank;

const KM_PER_DEGREE_LAT: f64 = 111.32;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCampaign {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub name: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub grid_size: i32,
    pub radius_km: f64,
    pub keywords: Vec<String>,
    pub frequency: Frequency,
    pub created_at: DateTime<Utc>,
}

impl LocalCampaign {
    pub fn grid_points(&self) -> Vec<GridPoint> {
        grid_points(self.center_lat, self.center_lng, self.grid_size as u32, self.radius_km)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub domain_id: Uuid,

    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,

    /// Polar centers are refused: longitude degrees shrink to nothing there.
    #[validate(range(min = -85.0, max = 85.0, message = "must be between -85 and 85"))]
    pub center_lat: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "must be between -180 and 180"))]
    pub center_lng: f64,

    #[validate(custom(function = "validate_grid_size"))]
    pub grid_size: u32,

    #[validate(range(min = 0.5, max = 50.0, message = "must be between 0.5 and 50 km"))]
    pub radius_km: f64,

    #[validate(length(min = 1, max = 20, message = "must contain between 1 and 20 keywords"))]
    pub keywords: Vec<String>,

    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
}

fn default_frequency() -> Frequency {
    Frequency::Weekly
}

fn validate_grid_size<T: Borrow<u32>>(size: T) -> Result<(), ValidationError> {
    let size = *size.borrow();
    if (3..=13).contains(&size) && size % 2 == 1 {
        Ok(())
    } else {
        let mut err = ValidationError::new("grid_size");
        err.message = Some("must be an odd number between 3 and 13".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPoint {
    pub row: u32,
    pub col: u32,
    pub lat: f64,
    pub lng: f64,
}

/// `size x size` points centered on `(lat, lng)`, row-major from the
/// north-west corner, spanning `radius_km` on each side of the center.
pub fn grid_points(lat: f64, lng: f64, size: u32, radius_km: f64) -> Vec<GridPoint> {
    if size <= 1 {
        return vec![GridPoint {
            row: 0,
            col: 0,
            lat,
            lng,
        }];
    }

    let step_km = 2.0 * radius_km / (size - 1) as f64;
    let half = (size - 1) as f64 / 2.0;
    let km_per_degree_lng = KM_PER_DEGREE_LAT * lat.to_radians().cos();

    let mut points = Vec::with_capacity((size * size) as usize);
    for row in 0..size {
        for col in 0..size {
            let north_km = (half - row as f64) * step_km;
            let east_km = (col as f64 - half) * step_km;
            points.push(GridPoint {
                row,
                col,
                lat: lat + north_km / KM_PER_DEGREE_LAT,
                lng: lng + east_km / km_per_degree_lng,
            });
        }
    }
    points
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPointRank {
    pub row: u32,
    pub col: u32,
    pub lat: f64,
    pub lng: f64,
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridKeywordResult {
    pub keyword: String,
    pub points: Vec<GridPointRank>,
    /// Mean over points where the business ranked at all.
    pub average_rank: Option<f64>,
}

impl GridKeywordResult {
    pub fn new(keyword: String, points: Vec<GridPointRank>) -> Self {
        let ranked: Vec<u32> = points.iter().filter_map(|p| p.rank).collect();
        let average_rank = if ranked.is_empty() {
            None
        } else {
            Some(ranked.iter().map(|&r| r as f64).sum::<f64>() / ranked.len() as f64)
        };
        Self {
            keyword,
            points,
            average_rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridScan {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub status: ScanStatus,
    pub results: Vec<GridKeywordResult>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: LocalCampaign,
    pub latest_scan: Option<GridScan>,
}
