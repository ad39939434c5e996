use super::{Hand, RawDevice, TrackerRole};

/// VRランタイムの抽象化
pub trait DeviceProvider {
    /// 現在のデバイス一覧で `out` を置き換える。
    /// 前回の呼び出しから一覧 (ID/分類/役割) が変わっていれば true
    fn poll_devices(&mut self, out: &mut Vec<RawDevice>) -> bool;

    /// シリアル番号から役割を引く
    fn tracker_role(&self, id: &str) -> TrackerRole;

    /// トリガーのアナログ値 (0.0..=1.0)。コントローラが無ければ None
    fn trigger_value(&self, hand: Hand) -> Option<f32>;
}
