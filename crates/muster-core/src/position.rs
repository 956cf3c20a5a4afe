//! Position titles shown on unit rosters and their short codes.

/// `(long title, short code)`; the long title is matched case-insensitively.
const POSITIONS: &[(&str, &str)] = &[
  ("Commander-in-Chief", "CiC"),
  ("Deputy Commander-in-Chief", "DCiC"),
  ("Division Commander", "DC"),
  ("Deputy Division Commander", "DDC"),
  ("Battalion Commander", "BC"),
  ("Battalion Executive Officer", "BXO"),
  ("Commanding Officer", "CO"),
  ("Executive Officer", "XO"),
  ("Platoon Leader", "PL"),
  ("Platoon Sergeant", "PSG"),
  ("Squad Leader", "SL"),
  ("Assistant Squad Leader", "ASL"),
  ("Fire Team Leader", "FTL"),
  ("Training Instructor", "TI"),
  ("Senior Training Instructor", "STI"),
  ("Recruiter", "RCT"),
  ("Public Relations Officer", "PRO"),
  ("Staff Officer", "SO"),
];

/// Short code for a long position title, if the title is known.
pub fn short_code(long_title: &str) -> Option<&'static str> {
  let title = long_title.trim();
  POSITIONS
    .iter()
    .find(|(long, _)| long.eq_ignore_ascii_case(title))
    .map(|(_, short)| *short)
}
