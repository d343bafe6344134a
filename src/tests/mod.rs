mod bridge;
mod commands;
mod escape;
mod serial;
mod settings;
