pub mod face_client;
