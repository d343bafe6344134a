use crate::commands::{dial_target, parse, split_host_port, Command, DialTarget};
use crate::flow::{FlowControlMode, PinPolarity};

#[test]
fn attention_is_case_insensitive() {
    assert_eq!(Command::Attention, parse("AT"));
    assert_eq!(Command::Attention, parse("at"));
    assert_eq!(Command::Attention, parse("aT"));
}

#[test]
fn unmatched_lines_are_unknown() {
    assert_eq!(Command::Unknown, parse("ATQ9"));
    assert_eq!(Command::Unknown, parse("HELLO"));
    assert_eq!(Command::Unknown, parse(""));
}

#[test]
fn dial_with_explicit_port() {
    assert_eq!(
        Command::Dial(DialTarget::Host { host: "bbs.example.com", port: 6400 }),
        parse("ATDTbbs.example.com:6400")
    );
}

#[test]
fn dial_defaults_to_telnet_port() {
    assert_eq!(
        Command::Dial(DialTarget::Host { host: "bbs.example.com", port: 23 }),
        parse("ATDT bbs.example.com")
    );
}

#[test]
fn all_dial_prefixes_accepted() {
    for line in ["ATDThost", "ATDPhost", "ATDIhost", "atdthost"] {
        assert_eq!(
            Command::Dial(DialTarget::Host { host: "host", port: 23 }),
            parse(line)
        );
    }
}

#[test]
fn virtual_targets() {
    assert_eq!(Command::Dial(DialTarget::Slip), parse("ATDTSLIP"));
    assert_eq!(Command::Dial(DialTarget::Slip), parse("ATDT7547"));
    assert_eq!(Command::Dial(DialTarget::Slip), parse("ATDT*75"));
    assert_eq!(Command::Dial(DialTarget::Ppp), parse("ATDTPPP"));
    assert_eq!(Command::Dial(DialTarget::Ppp), parse("atdt*77"));
    assert_eq!(Command::Dial(DialTarget::Ppp), parse("ATDT777"));
}

#[test]
fn repeated_digit_shorthand_selects_speed_dial() {
    assert_eq!(Command::Dial(DialTarget::SpeedDial(3)), parse("ATDT3333333"));
    assert_eq!(Command::Dial(DialTarget::SpeedDial(0)), parse("ATDT0000000"));

    // Mixed digits are an ordinary hostname
    assert_eq!(
        Command::Dial(DialTarget::Host { host: "1234567", port: 23 }),
        parse("ATDT1234567")
    );
}

#[test]
fn explicit_speed_dial() {
    assert_eq!(Command::Dial(DialTarget::SpeedDial(5)), parse("ATDS5"));
    assert_eq!(Command::Unknown, parse("ATDSX"));
}

#[test]
fn hex_echo_wins_over_hangup_prefix() {
    assert_eq!(Command::SetHexEcho(true), parse("ATHEX=1"));
    assert_eq!(Command::SetHexEcho(false), parse("ATHEX=0"));
    assert_eq!(Command::Help, parse("ATHELP"));
    assert_eq!(Command::Hangup, parse("ATH"));
    assert_eq!(Command::Hangup, parse("ATH0"));
}

#[test]
fn toggles_and_queries() {
    assert_eq!(Command::SetEcho(false), parse("ATE0"));
    assert_eq!(Command::SetEcho(true), parse("ate1"));
    assert_eq!(Command::QueryEcho, parse("ATE?"));
    assert_eq!(Command::Unknown, parse("ATE2"));

    assert_eq!(Command::SetVerbose(false), parse("ATV0"));
    assert_eq!(Command::QueryVerbose, parse("ATV?"));

    assert_eq!(Command::SetTelnet(true), parse("ATNET1"));
    assert_eq!(Command::QueryTelnet, parse("ATNET?"));

    assert_eq!(Command::SetPetscii(true), parse("ATPET=1"));
    assert_eq!(Command::QueryPetscii, parse("ATPET?"));

    assert_eq!(Command::SetAutoAnswer(false), parse("ATS0=0"));
    assert_eq!(Command::QueryAutoAnswer, parse("ATS0?"));
}

#[test]
fn flow_and_polarity() {
    assert_eq!(Command::SetFlowControl(FlowControlMode::None), parse("AT&K0"));
    assert_eq!(Command::SetFlowControl(FlowControlMode::Hardware), parse("AT&K1"));
    assert_eq!(Command::SetFlowControl(FlowControlMode::Software), parse("AT&K2"));
    assert_eq!(Command::QueryFlowControl, parse("AT&K?"));
    assert_eq!(Command::Unknown, parse("AT&K3"));

    assert_eq!(Command::SetPolarity(PinPolarity::Inverted), parse("AT&P0"));
    assert_eq!(Command::SetPolarity(PinPolarity::Normal), parse("AT&P1"));
    assert_eq!(Command::QueryPolarity, parse("AT&P?"));
}

#[test]
fn speed_dial_slots() {
    assert_eq!(
        Command::SetSpeedDial { slot: 3, target: "bbs.example.com:6400" },
        parse("AT&Z3=bbs.example.com:6400")
    );
    assert_eq!(Command::QuerySpeedDial(7), parse("AT&Z7?"));
    assert_eq!(Command::Unknown, parse("AT&ZX=host"));
    assert_eq!(Command::Unknown, parse("AT&Z5"));
}

#[test]
fn credentials_keep_case_and_spaces() {
    assert_eq!(Command::SetSsid("My Net"), parse("AT$SSID=My Net"));
    assert_eq!(Command::QuerySsid, parse("AT$SSID?"));
    assert_eq!(Command::SetPassword("s3cret PW"), parse("AT$PASS=s3cret PW"));
}

#[test]
fn numbers_must_parse() {
    assert_eq!(Command::SetBaud(19200), parse("AT$SB=19200"));
    assert_eq!(Command::Unknown, parse("AT$SB=FAST"));
    assert_eq!(Command::QueryBaud, parse("AT$SB?"));

    assert_eq!(Command::SetListenPort(2600), parse("AT$SP=2600"));
    assert_eq!(Command::Unknown, parse("AT$SP=NINE"));
}

#[test]
fn http_get_keeps_url_verbatim() {
    assert_eq!(
        Command::HttpGet("http://example.com/page.txt"),
        parse("ATGEThttp://example.com/page.txt")
    );
}

#[test]
fn remaining_simple_commands() {
    assert_eq!(Command::Answer, parse("ATA"));
    assert_eq!(Command::Resume, parse("ATO"));
    assert_eq!(Command::Help, parse("AT?"));
    assert_eq!(Command::Reload, parse("ATZ"));
    assert_eq!(Command::Save, parse("AT&W"));
    assert_eq!(Command::FactoryReset, parse("AT&F"));
    assert_eq!(Command::ShowProfile, parse("AT&V"));
    assert_eq!(Command::NetworkInfo, parse("ATI"));
    assert_eq!(Command::LocalIp, parse("ATIP?"));
    assert_eq!(Command::WifiOff, parse("ATC0"));
    assert_eq!(Command::WifiOn, parse("ATC1"));
    assert_eq!(Command::ConsoleStatus, parse("AT$CON?"));
    assert_eq!(Command::ConsoleDrop, parse("AT$CONDROP"));
    assert_eq!(Command::Restart, parse("AT$RB"));
    assert_eq!(Command::ExitModem, parse("ATX"));
    assert_eq!(Command::SetBusyMessage("GONE FISHING"), parse("AT$BM=GONE FISHING"));
    assert_eq!(Command::QueryBusyMessage, parse("AT$BM?"));
}

#[test]
fn host_port_splitting() {
    assert_eq!(("host", 23), split_host_port("host"));
    assert_eq!(("host", 6502), split_host_port("host:6502"));
    // Unparseable ports map to the invalid port 0
    assert_eq!(("host", 0), split_host_port("host:"));
    assert_eq!(("host", 0), split_host_port("host:99999"));
}

#[test]
fn dial_target_trims_whitespace() {
    assert_eq!(
        DialTarget::Host { host: "host", port: 23 },
        dial_target("  host  ")
    );
    assert_eq!(DialTarget::Slip, dial_target(" slip "));
}
