use super::*;

#[test]
fn hash_verifies_only_the_original_password() {
    let hash = PasswordHash::new("hunter2", MIN_COST).expect("hash");
    assert!(hash.verify("hunter2"));
    assert!(!hash.verify("hunter3"));
    assert!(!hash.verify(""));
}

#[test]
fn hash_is_bcrypt_not_plaintext() {
    let hash = PasswordHash::new("hunter2", MIN_COST).expect("hash");
    assert!(hash.0.starts_with("$2"));
    assert!(!hash.0.contains("hunter2"));
}

#[test]
fn same_password_gets_different_salts() {
    let a = PasswordHash::new("secret", MIN_COST).expect("hash");
    let b = PasswordHash::new("secret", MIN_COST).expect("hash");
    assert_ne!(a, b);
    assert!(a.verify("secret") && b.verify("secret"));
}

#[test]
fn cost_out_of_range_is_an_error() {
    let err = PasswordHash::new("secret", MIN_COST - 1).expect_err("cost too low");
    assert!(matches!(err, RoomError::PasswordHash(_)));
}

#[test]
fn malformed_stored_hash_never_verifies() {
    let hash = PasswordHash("not-a-bcrypt-hash".into());
    assert!(!hash.verify("not-a-bcrypt-hash"));
}

#[test]
fn check_password_open_room_accepts_anything() {
    assert!(check_password(None, None).is_ok());
    assert!(check_password(None, Some("whatever")).is_ok());
}

#[test]
fn check_password_distinguishes_missing_and_wrong() {
    let hash = PasswordHash::new("letmein", MIN_COST).expect("hash");
    assert!(matches!(check_password(Some(&hash), None), Err(RoomError::PasswordRequired)));
    assert!(matches!(check_password(Some(&hash), Some("")), Err(RoomError::PasswordRequired)));
    assert!(matches!(check_password(Some(&hash), Some("nope")), Err(RoomError::PasswordIncorrect)));
    assert!(check_password(Some(&hash), Some("letmein")).is_ok());
}
