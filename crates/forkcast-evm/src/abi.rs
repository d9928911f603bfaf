//! Contract interfaces the harness talks to, via alloy's `sol!` macro.

use alloy::sol;

sol! {
    /// ERC-20 token interface.
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    /// Wrapped native token (WETH-style).
    interface IWrappedNative {
        function deposit() external payable;
    }

    /// DSA index: wallet factory and holder of the master key.
    interface IInstaIndex {
        event LogAccountCreated(address sender, address indexed owner, address indexed account, address indexed origin);

        function master() external view returns (address);
        function build(address owner, uint256 accountVersion, address origin) external returns (address account);
    }

    /// DSA connector registry (v2).
    interface IInstaConnectorsV2 {
        function connectors(string calldata name) external view returns (address);
        function isConnectors(string[] calldata names) external view returns (bool isOk, address[] memory addresses);
        function addConnectors(string[] calldata names, address[] calldata connectorAddresses) external;
    }

    /// DSA smart-account wallet (v2).
    interface IInstaAccountV2 {
        function cast(string[] calldata targetNames, bytes[] calldata datas, address origin) external payable returns (bytes32);
    }

    /// Sushiswap connector.
    interface IConnectV2Sushiswap {
        function deposit(address tokenA, address tokenB, uint256 amtA, uint256 unitAmt, uint256 slippage, uint256 getId, uint256 setId) external payable returns (string memory eventName, bytes memory eventParam);
        function withdraw(address tokenA, address tokenB, uint256 uniAmt, uint256 unitAmtA, uint256 unitAmtB, uint256 getId, uint256[] calldata setIds) external payable returns (string memory eventName, bytes memory eventParam);
        function buy(address buyAddr, address sellAddr, uint256 buyAmt, uint256 unitAmt, uint256 getId, uint256 setId) external payable returns (string memory eventName, bytes memory eventParam);
        function sell(address buyAddr, address sellAddr, uint256 sellAmt, uint256 unitAmt, uint256 getId, uint256 setId) external payable returns (string memory eventName, bytes memory eventParam);
    }

    /// Uniswap-V2 style pair factory.
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, U256};
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn encode_balance_of() {
        let call = IERC20::balanceOfCall {
            owner: Address::ZERO,
        };
        let encoded = call.abi_encode();
        assert_eq!(encoded.len(), 36);
        // balanceOf(address) selector = 0x70a08231
        assert_eq!(&encoded[..4], &[0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn encode_transfer() {
        let call = IERC20::transferCall {
            to: Address::ZERO,
            amount: U256::from(1000u64),
        };
        let encoded = call.abi_encode();
        assert_eq!(encoded.len(), 68);
        // transfer(address,uint256) selector = 0xa9059cbb
        assert_eq!(&encoded[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn weth_deposit_selector() {
        // deposit() selector = 0xd0e30db0
        assert_eq!(
            IWrappedNative::depositCall {}.abi_encode(),
            vec![0xd0, 0xe3, 0x0d, 0xb0]
        );
    }

    #[test]
    fn sushiswap_signatures() {
        assert_eq!(
            IConnectV2Sushiswap::depositCall::SIGNATURE,
            "deposit(address,address,uint256,uint256,uint256,uint256,uint256)"
        );
        assert_eq!(
            IConnectV2Sushiswap::withdrawCall::SIGNATURE,
            "withdraw(address,address,uint256,uint256,uint256,uint256,uint256[])"
        );
        assert_eq!(
            IConnectV2Sushiswap::buyCall::SIGNATURE,
            "buy(address,address,uint256,uint256,uint256,uint256)"
        );
    }

    #[test]
    fn cast_signature() {
        assert_eq!(
            IInstaAccountV2::castCall::SIGNATURE,
            "cast(string[],bytes[],address)"
        );
        let call = IInstaAccountV2::castCall {
            targetNames: vec!["Sushiswap-v1".into()],
            datas: vec![Bytes::from(vec![0xde, 0xad])],
            origin: Address::ZERO,
        };
        let decoded = IInstaAccountV2::castCall::abi_decode(&call.abi_encode()).unwrap();
        assert_eq!(decoded.targetNames, vec!["Sushiswap-v1".to_string()]);
    }

    #[test]
    fn account_created_event_signature() {
        assert_eq!(
            IInstaIndex::LogAccountCreated::SIGNATURE,
            "LogAccountCreated(address,address,address,address)"
        );
    }

    #[test]
    fn decode_is_connectors_return() {
        use alloy::sol_types::SolValue;
        let encoded = (true, vec![Address::with_last_byte(7)]).abi_encode_params();
        let ret = IInstaConnectorsV2::isConnectorsCall::abi_decode_returns(&encoded).unwrap();
        assert!(ret.isOk);
        assert_eq!(ret.addresses, vec![Address::with_last_byte(7)]);
    }
}
