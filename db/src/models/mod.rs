pub mod attendance_record;
pub mod attendance_session;
pub mod chat_group;
pub mod group_member;
pub mod user;
pub mod user_face;
