/////////
/// Generated system files
////////
use crate::settings::{InstallerSettings, SETTINGS_PATH};

pub const INIT_SCRIPT_NAME: &str = "loudness-correction";
pub const INIT_SCRIPT_PATH: &str = "/etc/init.d/loudness-correction";
pub const SAMBA_CONFIG_PATH: &str = "/etc/samba/smb.conf";
pub const SCRIPT_INSTALL_DIR: &str = "/usr/local/lib/loudness-correction";

// Full smb.conf exposing the hotfolder as a single guest-writable share
pub fn render_samba_config(share_name: &str, path: &str, user: &str) -> String {
    format!(
        "[global]
   workgroup = WORKGROUP
   server string = Loudness Correction Server
   netbios name = {netbios}
   security = user
   map to guest = Bad User
   guest account = {user}
   log file = /var/log/samba/log.%m
   max log size = 1000
   dns proxy = no
   load printers = no
   printing = bsd
   printcap name = /dev/null
   disable spoolss = yes

[{share_name}]
   comment = Loudness Correction hotfolder
   path = {path}
   browseable = yes
   read only = no
   guest ok = yes
   force user = {user}
   create mask = 0666
   directory mask = 0777
",
        netbios = netbios_name(share_name),
    )
}

// NetBIOS names are at most 15 characters, upper case, no spaces
fn netbios_name(share_name: &str) -> String {
    let cleaned: String = share_name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .take(15)
        .collect();
    if cleaned.is_empty() {
        "LOUDNESS".to_string()
    } else {
        cleaned.to_ascii_uppercase()
    }
}

fn ramdisk_block(settings: &InstallerSettings) -> String {
    if !settings.use_ramdisk {
        return String::new();
    }
    let temp_dir = settings.temp_dir();
    format!(
        "    # Temporary files live on a ram disk
    mke2fs -q -m 0 {device}
    mount {device} \"{temp}\"
    chown {user}:{user} \"{temp}\"
    chmod 755 \"{temp}\"
",
        device = settings.ramdisk_device,
        temp = temp_dir.display(),
        user = settings.server_user,
    )
}

fn ramdisk_stop_block(settings: &InstallerSettings) -> String {
    if !settings.use_ramdisk {
        return String::new();
    }
    format!(
        "    umount \"{}\" 2>/dev/null || true\n",
        settings.temp_dir().display()
    )
}

fn heartbeat_block(settings: &InstallerSettings) -> String {
    if !settings.heartbeat {
        return String::new();
    }
    format!(
        "    su - {user} -c \"python3 {dir}/HeartBeat_Checker.py -configfile {config}\" &
",
        user = settings.server_user,
        dir = SCRIPT_INSTALL_DIR,
        config = SETTINGS_PATH,
    )
}

// SysV init script that starts the server as the chosen user
pub fn render_init_script(settings: &InstallerSettings) -> String {
    format!(
        "#!/bin/sh
### BEGIN INIT INFO
# Provides:          {name}
# Required-Start:    $remote_fs $syslog $network
# Required-Stop:     $remote_fs $syslog $network
# Default-Start:     2 3 4 5
# Default-Stop:      0 1 6
# Short-Description: Loudness Correction server
### END INIT INFO

HOTFOLDER=\"{hotfolder}\"

start() {{
{ramdisk}    su - {user} -c \"python3 {dir}/LoudnessCorrection.py -configfile {config}\" &
{heartbeat}}}

stop() {{
    pkill -f {dir}/LoudnessCorrection.py || true
    pkill -f {dir}/HeartBeat_Checker.py || true
{ramdisk_stop}}}

case \"$1\" in
    start)
        start
        ;;
    stop)
        stop
        ;;
    restart)
        stop
        sleep 2
        start
        ;;
    *)
        echo \"Usage: $0 {{start|stop|restart}}\"
        exit 1
        ;;
esac

exit 0
",
        name = INIT_SCRIPT_NAME,
        hotfolder = settings.hotfolder().display(),
        user = settings.server_user,
        dir = SCRIPT_INSTALL_DIR,
        config = SETTINGS_PATH,
        ramdisk = ramdisk_block(settings),
        heartbeat = heartbeat_block(settings),
        ramdisk_stop = ramdisk_stop_block(settings),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> InstallerSettings {
        InstallerSettings {
            server_user: "audio".to_string(),
            ..InstallerSettings::default()
        }
    }

    #[test]
    fn samba_share_uses_name_and_path() {
        let conf = render_samba_config("Loudness Share", "/srv/lcs", "audio");
        assert!(conf.contains("[Loudness Share]"));
        assert!(conf.contains("path = /srv/lcs"));
        assert!(conf.contains("force user = audio"));
        assert!(conf.contains("netbios name = LOUDNESSSHARE"));
    }

    #[test]
    fn netbios_name_is_truncated() {
        assert_eq!(netbios_name("a-very-long-share-name").len(), 15);
        assert_eq!(netbios_name("   "), "LOUDNESS");
    }

    #[test]
    fn init_script_without_optional_blocks() {
        let mut settings = settings();
        settings.use_ramdisk = false;
        settings.heartbeat = false;
        let script = render_init_script(&settings);
        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("su - audio -c"));
        assert!(!script.contains("mke2fs"));
        assert!(!script.contains("HeartBeat_Checker.py -configfile"));
    }

    #[test]
    fn init_script_with_ramdisk_and_heartbeat() {
        let mut settings = settings();
        settings.use_ramdisk = true;
        settings.ramdisk_device = "/dev/ram2".to_string();
        settings.heartbeat = true;
        let script = render_init_script(&settings);
        assert!(script.contains("mke2fs -q -m 0 /dev/ram2"));
        assert!(script.contains("umount \"/LoudnessCorrection/00-Loudness_Calculation_Temporary_Files\""));
        assert!(script.contains("HeartBeat_Checker.py -configfile"));
    }
}
