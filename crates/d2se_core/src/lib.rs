pub mod bitstream;
pub mod checksum;
pub mod class;
pub mod core_api;
pub mod d2s;
pub mod gps;
pub mod interchange;
pub mod layout;
pub mod status;
pub mod version;
