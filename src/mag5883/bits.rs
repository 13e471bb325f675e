// This code is provided under the MIT license.

use bitfield::bitfield;

bitfield! {
    /// bitfields of the HMC5883L configuration register A
    pub struct HmcControlA(u8);
    impl Debug;
    /// number of samples averaged per measurement output
    pub u8, over_sampling, set_over_sampling: 6, 5;
    /// data output rate in continuous mode
    pub u8, rate, set_rate: 4, 2;
    /// measurement bias, used by the self test
    pub u8, bias, set_bias: 1, 0;
}

bitfield! {
    /// bitfields of the HMC5883L configuration register B
    pub struct HmcControlB(u8);
    impl Debug;
    /// gain (range) selection
    pub u8, range, set_range: 7, 5;
}

bitfield! {
    /// bitfields of the QMC5883L control register 1
    pub struct QmcControl1(u8);
    impl Debug;
    /// over sample ratio
    pub u8, over_sampling, set_over_sampling: 7, 6;
    /// full scale range
    pub u8, range, set_range: 5, 4;
    /// output data rate
    pub u8, rate, set_rate: 3, 2;
    /// standby / continuous mode
    pub u8, mode, set_mode: 1, 0;
}

bitfield! {
    /// bitfields of the QMC5883L control register 2
    pub struct QmcControl2(u8);
    impl Debug;
    /// soft reset, restores the default register state
    pub soft_rst, set_soft_rst: 7;
    /// roll the read pointer over between 0x00 and 0x06
    pub rol_pnt, set_rol_pnt: 6;
    /// interrupt pin enable
    pub int_enb, set_int_enb: 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmc_control_a_packs_fields() {
        let mut control_a = HmcControlA(0);
        control_a.set_over_sampling(0b11);
        control_a.set_rate(0b110);
        control_a.set_bias(0b01);
        assert_eq!(control_a.0, 0b0111_1001);
    }

    #[test]
    fn hmc_control_b_uses_top_bits() {
        let mut control_b = HmcControlB(0);
        control_b.set_range(0b111);
        assert_eq!(control_b.0, 0b1110_0000);
    }

    #[test]
    fn qmc_control_1_packs_fields() {
        let mut control = QmcControl1(0);
        control.set_over_sampling(0b00);
        control.set_range(0b01);
        control.set_rate(0b10);
        control.set_mode(0b01);
        assert_eq!(control.0, 0b0001_1001);
    }

    #[test]
    fn qmc_control_2_soft_reset_is_msb() {
        let mut control = QmcControl2(0);
        control.set_soft_rst(true);
        assert_eq!(control.0, 0x80);
    }
}
