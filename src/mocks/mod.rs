pub mod mock_calendar;
pub mod mock_chat_client;
