use crate::flow::{FlowControlMode, PinPolarity};
use crate::settings::{Settings, SettingsStore, BAUD_RATES, SPEED_DIAL_SLOTS};
use crate::tests::mock::MockStore;

#[test]
fn factory_defaults() {
    let settings = Settings::default();

    assert_eq!(9600, settings.baud());
    assert!(settings.echo);
    assert!(settings.verbose);
    assert!(settings.auto_answer);
    assert!(!settings.telnet);
    assert!(!settings.petscii);
    assert_eq!(FlowControlMode::None, settings.flow_control);
    assert_eq!(PinPolarity::Normal, settings.pin_polarity);
    assert_eq!(23, settings.listen_port);
    assert!(settings.ssid.is_empty());
    assert_eq!(
        "SORRY, SYSTEM IS CURRENTLY BUSY. PLEASE TRY AGAIN LATER.",
        settings.busy_message.as_str()
    );
}

#[test]
fn factory_speed_dials_are_seeded() {
    let settings = Settings::default();

    assert_eq!(SPEED_DIAL_SLOTS, settings.speed_dials.len());
    assert_eq!("bbs.fozztexx.com:23", settings.speed_dials[0].as_str());
    assert_eq!("vert.synchro.net:23", settings.speed_dials[9].as_str());
    for dial in &settings.speed_dials {
        assert!(!dial.is_empty());
    }
}

#[test]
fn set_baud_accepts_only_table_rates() {
    let mut settings = Settings::default();

    for &rate in &BAUD_RATES {
        assert!(settings.set_baud(rate));
        assert_eq!(rate, settings.baud());
    }

    assert!(!settings.set_baud(14400));
    // Rejected rates leave the setting untouched
    assert_eq!(115_200, settings.baud());
}

#[test]
fn reset_to_defaults_rewrites_the_store() {
    let mut store = MockStore::default();
    let mut custom = Settings::default();
    custom.echo = false;
    custom.listen_port = 6400;
    store.save(&custom).unwrap();

    let restored = store.reset_to_defaults().unwrap();

    assert_eq!(Settings::default(), restored);
    assert_eq!(Some(Settings::default()), store.stored);
}
