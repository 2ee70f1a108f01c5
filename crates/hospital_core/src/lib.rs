pub mod auth;
pub mod domain;
pub mod ports;
pub mod transfer;

pub use auth::{AuthContext, AuthError};
pub use domain::{
    AuthSession, Gender, Governorate, Hospital, MedicalService, MedicalStandard, NationalId,
    Patient, PatientStatus, PermissionSet, Protocol, PublicUser, Role, User, ValidationError,
};
pub use ports::{DatabaseService, PortError, PortResult};
pub use transfer::{TransferOutcome, TransferRequest, TransferStatus};
