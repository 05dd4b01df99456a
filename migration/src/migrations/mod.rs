pub mod m202601150001_create_users;
pub mod m202601150002_create_chat_groups;
pub mod m202601150003_create_user_faces;
pub mod m202601150004_create_attendance;
