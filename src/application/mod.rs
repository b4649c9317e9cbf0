pub mod search_session;
