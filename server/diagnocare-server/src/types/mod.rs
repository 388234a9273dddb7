pub mod pagination;

pub use pagination::CenterAppointmentQuery;
