pub mod semasms;

pub use semasms::{Credentials, GatewayOutcome, OutboundSms, SemaSmsClient, SmsGateway};
