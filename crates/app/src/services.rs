//! Application services (driving ports / use-cases).

pub mod geofence_service;

pub use geofence_service::GeofenceService;
