//! Fixed user-facing strings.

pub const APP_TITLE: &str = "গ্রামজিপিটি";
pub const APP_TAGLINE: &str = "আপনার গ্রামীণ বন্ধু।";
pub const INPUT_PLACEHOLDER: &str = "এখানে আপনার প্রশ্ন লিখুন বা ছবি যোগ করুন...";

/// Shown when the provider call fails for any reason.
pub const PROVIDER_FAILURE_MESSAGE: &str =
    "দুঃখিত, একটি সমস্যা হয়েছে। অনুগ্রহ করে আবার চেষ্টা করুন।";

/// Shown when the attached image cannot be read or encoded.
pub const FILE_READ_FAILURE_MESSAGE: &str = "Failed to process the image file.";

pub const INIT_FAILURE_PREFIX: &str = "Chat is unavailable";

/// Starter prompts offered while the transcript is empty.
pub const SUGGESTIONS: [&str; 4] = [
    "আজকের আবহাওয়া কেমন?",
    "গ্রামের একটি সুন্দর গল্প বলো",
    "ধানক্ষেতের একটি ছবি আঁকো",
    "ফসলের রোগ নির্ণয় করতে সাহায্য করো",
];

pub fn init_failure_message(reason: impl std::fmt::Display) -> String {
    format!("{INIT_FAILURE_PREFIX}: {reason}")
}

pub const USER_LABEL: &str = "আপনি";
pub const MODEL_LABEL: &str = APP_TITLE;
pub const PENDING_INDICATOR: &str = "...";

pub const HELP_TEXT: &str = "\
Type a message and press Enter to send it.
  /attach <path>   attach an image to the next message
  /detach          remove the pending image
  /suggest <1-4>   send one of the suggested prompts
  /help            show this help
  /quit            exit";
