//! Insight detection and short-horizon forecasting.
//!
//! Both work on the trailing window of a cleaned series: [`insights`]
//! counts high-pollution hours and classifies trends, [`forecast`]
//! extrapolates a least-squares line over the next [`types::HORIZON`] hours.
//! [`reasoning`] turns the insights into a concerns-and-policy analysis.

pub mod forecast;
pub mod insights;
pub mod reasoning;
pub mod trend;
pub mod types;
pub mod utility;
