pub mod asset;
pub mod attendance;
pub mod challenge;
pub mod employee;
pub mod evaluation;
pub mod evening_schedule;
pub mod events;
pub mod leave_request;
pub mod live_match;
pub mod message;
pub mod news;
pub mod notification;
pub mod report;
pub mod setting;

#[cfg(test)]
pub mod test_support;
