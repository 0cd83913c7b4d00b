/// WebSocket connection and message handling for operators and displays.
pub mod websocket_service;
